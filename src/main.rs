use anyhow::{Context, Result};
use clap::Parser;
use ddlog::config::Config;
use ddlog::generator::Generator;
use ddlog::monitor::TrafficMonitor;
use ddlog::util::human::fmt_duration;
use ddlog::util::randutil::Rand;
use std::io::{self, Write};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ddlog", about = "Random HTTP access-log generator", version = "0.1")]
struct Cli {
    /// Line template, e.g. '{remote} {ident} {auth} [{time}] "{method} {uri} {proto}" {status} {size}'
    #[arg(long = "fmt")]
    log_format: Option<String>,

    /// strftime layout for the {time} field
    #[arg(long = "time")]
    time_format: Option<String>,

    /// How often to emit a line (Go-style duration: 1s, 250ms, 1m30s)
    #[arg(long)]
    rate: Option<String>,

    /// Stop after this many lines
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Seed the random source for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Draw auth users from several scripts instead of ASCII
    #[arg(long)]
    unicode: bool,

    /// Seed this many preset pages as the first path segment
    #[arg(long)]
    pages: Option<usize>,

    /// Emit JSON lines instead of formatted text
    #[arg(long)]
    json: bool,

    /// Print the canonical example line and exit
    #[arg(long)]
    test_msg: bool,

    /// Log rolling window stats every N lines (0 = never)
    #[arg(long)]
    stats_every: Option<u64>,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,
}

impl Cli {
    /// Flags win over the config file.
    fn apply(&self, cfg: &mut Config) {
        if let Some(f) = &self.log_format  { cfg.generator.log_format  = f.clone(); }
        if let Some(t) = &self.time_format { cfg.generator.time_format = t.clone(); }
        if let Some(r) = &self.rate        { cfg.driver.rate           = r.clone(); }
        if let Some(p) = self.pages        { cfg.generator.page_count  = p; }
        if let Some(s) = self.stats_every  { cfg.driver.stats_every    = s; }
        if self.unicode                    { cfg.generator.use_unicode = true; }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut cfg = Config::load()?;
    cli.apply(&mut cfg);

    if cli.config {
        return run_print_config(&cfg);
    }

    cfg.validate()?;

    if cli.test_msg {
        return run_test_msg(&cfg, cli.json);
    }
    run(&cfg, &cli)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ddlog=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_print_config(cfg: &Config) -> Result<()> {
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[generator]");
    println!("  log_format   = {}", cfg.generator.log_format);
    println!("  time_format  = {}", cfg.generator.time_format);
    println!("  use_unicode  = {}", cfg.generator.use_unicode);
    println!("  page_count   = {}", cfg.generator.page_count);
    println!();
    println!("[driver]");
    println!("  rate         = {}", cfg.driver.rate);
    println!("  stats_every  = {}", cfg.driver.stats_every);
    println!();
    println!("[window]");
    println!("  bucket_width = {}", cfg.window.bucket_width);
    println!("  bucket_count = {}", cfg.window.bucket_count);
    if let Err(e) = cfg.validate() {
        println!();
        println!("invalid: {:#}", e);
    }
    Ok(())
}

fn run_test_msg(cfg: &Config, json: bool) -> Result<()> {
    let gen = Generator::new(cfg.generator.clone(), Rand::from_entropy());
    let msg = gen.test_msg()?;
    let line = if json {
        msg.to_json()?
    } else {
        msg.render(&gen.config().log_format, &gen.config().time_format)?
    };
    println!("{}", line);
    Ok(())
}

fn run(cfg: &Config, cli: &Cli) -> Result<()> {
    let rate         = cfg.driver.rate()?;
    let bucket_width = cfg.window.bucket_width()?;
    let stats_every  = cfg.driver.stats_every;

    let rng = match cli.seed {
        Some(s) => Rand::seeded(s),
        None    => Rand::from_entropy(),
    };
    let mut gen = Generator::new(cfg.generator.clone(), rng);
    gen.seed_page_choices(cfg.generator.page_count);

    let mut monitor = TrafficMonitor::new(bucket_width, cfg.window.bucket_count);

    info!(
        rate         = %fmt_duration(rate),
        bucket_width = %fmt_duration(monitor.bucket_width()),
        buckets      = monitor.bucket_count(),
        window       = %fmt_duration(monitor.stats().window),
        "ddlog starting"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut emitted: u64 = 0;
    let mut next = Instant::now();

    while cli.count.map_or(true, |n| emitted < n) {
        next += rate;
        std::thread::sleep(next.saturating_duration_since(Instant::now()));
        monitor.tick();

        let msg = gen.rand_msg();
        let line = if cli.json {
            msg.to_json()?
        } else {
            msg.render(&gen.config().log_format, &gen.config().time_format)?
        };
        match writeln!(out, "{}", line) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("stdout closed");
                break;
            }
            Err(e) => return Err(e).context("writing to stdout"),
        }

        monitor.observe(&msg);
        emitted += 1;
        if stats_every > 0 && emitted % stats_every == 0 {
            info!("{}", monitor.stats());
        }
    }

    info!(emitted, "done");
    Ok(())
}
