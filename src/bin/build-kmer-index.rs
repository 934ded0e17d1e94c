use std::path::PathBuf;
use std::time::Instant;
use std::{env, process};

use prg_kmer_index::{CacheOutcome, IndexParams, PrgInfo};
use prg_kmer_index::{formats, utils};
use prg_kmer_index::{generate_kmer_index, get_kmer_index_with_outcome};

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    // Parse arguments.
    let config = Config::new()?;

    // Build the PRG index.
    eprintln!("Loading PRG {}", config.prg_file.display());
    let prg_info = PrgInfo::load_from(&config.prg_file).map_err(|x| x.to_string())?;
    eprintln!(
        "The PRG contains {} symbols and {} variant sites",
        prg_info.len() - 1, prg_info.site_count()
    );

    // Load or build the kmer index.
    let index = if config.force {
        generate_kmer_index(&config.cache_file, &config.params, &prg_info).map_err(|x| x.to_string())?
    } else {
        let (index, outcome) = get_kmer_index_with_outcome(&config.cache_file, &config.params, &prg_info)
            .map_err(|x| x.to_string())?;
        match outcome {
            CacheOutcome::Loaded => eprintln!("Using the existing cache {}", config.cache_file.display()),
            CacheOutcome::Generated => eprintln!("Wrote the cache {}", config.cache_file.display()),
        }
        index
    };

    // Statistics.
    eprintln!("Kmer index: {}", index.statistics());
    let size = utils::file_size(&config.cache_file).unwrap_or(String::from("unknown"));
    eprintln!("Cache file size: {}", size);

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub prg_file: PathBuf,
    pub cache_file: PathBuf,
    pub force: bool,
    pub params: IndexParams,
}

impl Config {
    pub fn new() -> Result<Config, String> {
        let mut params = IndexParams::default();

        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] prg.txt[.gz]", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        let kmer_desc = format!("kmer length (default: {})", params.kmer_size);
        opts.optopt("k", "kmer-size", &kmer_desc, "INT");
        let thread_desc = format!("number of threads (default: {})", params.threads);
        opts.optopt("t", "threads", &thread_desc, "INT");
        opts.optopt("o", "output", "cache file name (default: <input>.kmers; use .gz for compression)", "FILE");
        opts.optopt("x", "crosses-marker", "allow matches to cross variant-site markers (0 or 1; default: 1)", "FLAG");
        opts.optflag("f", "force", "rebuild the index even if the cache is valid");
        let matches = match opts.parse(&args[1..]) {
            Ok(m) => m,
            Err(f) => {
                eprintln!("{}", f);
                process::exit(1);
            }
        };

        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }
        if let Some(s) = matches.opt_str("k") {
            params.kmer_size = s.parse::<usize>().map_err(|x| format!("--kmer-size: {}", x))?;
        }
        if let Some(s) = matches.opt_str("t") {
            params.threads = s.parse::<usize>().map_err(|x| format!("--threads: {}", x))?;
        }
        if let Some(s) = matches.opt_str("x") {
            params.crosses_marker = formats::parse_crosses_marker_flag(&s).map_err(|x| x.to_string())?;
        }
        params.validate().map_err(|x| x.to_string())?;

        let prg_file = if let Some(s) = matches.free.first() {
            PathBuf::from(s)
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };
        let cache_file = if let Some(s) = matches.opt_str("o") {
            PathBuf::from(s)
        } else {
            let mut name = prg_file.clone().into_os_string();
            name.push(".kmers");
            PathBuf::from(name)
        };

        Ok(Config {
            prg_file, cache_file,
            force: matches.opt_present("f"),
            params,
        })
    }
}

//-----------------------------------------------------------------------------
