use std::path::PathBuf;
use std::{env, process, slice};

use prg_kmer_index::{encode_pattern, load_kmer_index};
use prg_kmer_index::formats;

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::new()?;
    let index = load_kmer_index(&config.cache_file, config.kmer_size).map_err(|x| x.to_string())?;

    // Kmer and occurrence count, followed by one `interval|path` field per search state.
    for kmer in config.kmers.iter() {
        let pattern = encode_pattern(kmer).map_err(|x| format!("{}: {}", kmer, x))?;
        if pattern.len() != config.kmer_size {
            return Err(format!("Kmer {} is not of length {}", kmer, config.kmer_size));
        }
        let states = index.get(&pattern).ok_or(format!("Kmer {} is not in the index", kmer))?;
        let occurrences: usize = states.iter().map(|state| state.sa_interval.len()).sum();
        print!("{}\t{}", kmer.to_ascii_uppercase(), occurrences);
        for state in states.iter() {
            let state = slice::from_ref(state);
            print!(
                "\t{}{}{}",
                formats::dump_sa_intervals(state), formats::FIELD_SEPARATOR, formats::dump_variant_site_paths(state)
            );
        }
        println!();
    }

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub cache_file: PathBuf,
    pub kmer_size: usize,
    pub kmers: Vec<String>,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] cache.kmers kmer1 [kmer2 ...]", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("k", "kmer-size", "kmer length of the cache (required)", "INT");
        let matches = opts.parse(&args[1..]).map_err(|x| x.to_string())?;

        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }
        let kmer_size = if let Some(s) = matches.opt_str("k") {
            s.parse::<usize>().map_err(|x| format!("--kmer-size: {}", x))?
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };
        if matches.free.len() < 2 {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        }

        Ok(Config {
            cache_file: PathBuf::from(&matches.free[0]),
            kmer_size,
            kmers: matches.free[1..].to_vec(),
        })
    }
}

//-----------------------------------------------------------------------------
