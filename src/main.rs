use clap::Parser;
use ipa_resign::{
    tools, Codesign, Envman, LogSink, ResignConfig, ResignOptions, Resigner, Result, ResultSink,
    SecurityTool, Toolchain,
};
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "ipa-resign")]
#[command(about = "Re-sign an IPA for appstore, inhouse or development distribution")]
#[command(version)]
struct Cli {
    /// Distribution type: appstore, inhouse or development
    #[arg(short = 't', long, env = "distribution_type")]
    distribution_type: Option<String>,

    /// The IPA to re-sign
    #[arg(short, long, env = "ipa_path")]
    ipa_path: Option<PathBuf>,

    /// Team id the signing certificate must belong to
    #[arg(long, env = "itunes_connect_team_id")]
    team_id: Option<String>,

    /// Application identifier prefix (defaults to the team id)
    #[arg(long, env = "app_id_prefix")]
    app_id_prefix: Option<String>,

    /// Directory of installed provisioning profiles
    #[arg(long)]
    profiles_dir: Option<PathBuf>,

    /// Directory holding the toolchain's Swift runtime libraries
    #[arg(long)]
    swift_libraries: Option<PathBuf>,

    /// Seconds to wait for each external tool before giving up
    #[arg(long, default_value = "300")]
    tool_timeout: u64,

    /// The compression level of the ipa (0-9, defaults to 6)
    #[arg(short = 'c', long, default_value = "6", value_parser = clap::value_parser!(u32).range(0..=9))]
    compress: u32,

    /// Do not publish the output path through envman
    #[arg(long)]
    no_publish: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("\x1b[31m[!] Error: {}\x1b[0m", e);
        eprintln!("\x1b[31mFailed to resign ipa\x1b[0m");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();
}

fn run(cli: Cli) -> Result<()> {
    info!("Configs:");
    info!(
        "  * ipa_path: {}",
        cli.ipa_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
    );
    info!("  * distribution_type: {}", cli.distribution_type.as_deref().unwrap_or(""));
    info!("  * team_id: {}", cli.team_id.as_deref().unwrap_or(""));
    info!("  * app_id_prefix: {}", cli.app_id_prefix.as_deref().unwrap_or(""));

    let timeout = Duration::from_secs(cli.tool_timeout);
    let swift_libraries = cli.swift_libraries.or_else(|| xcode_swift_libraries(timeout));

    let config = ResignConfig::from_options(ResignOptions {
        distribution_type: cli.distribution_type,
        ipa_path: cli.ipa_path,
        team_id: cli.team_id,
        app_id_prefix: cli.app_id_prefix,
        profiles_dir: cli.profiles_dir,
        swift_libraries,
        tool_timeout: Some(timeout),
        compression_level: Some(cli.compress),
    })?;

    let security = SecurityTool::new(config.tool_timeout);
    let codesign = Codesign::new(config.tool_timeout);
    let envman = Envman::new(config.tool_timeout);
    let sink: &dyn ResultSink = if cli.no_publish { &LogSink } else { &envman };

    let outcome = Resigner::new(
        &config,
        Toolchain {
            keychain: &security,
            decoder: &security,
            signer: &codesign,
            sink,
        },
    )
    .run()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    Ok(())
}

/// `<developer dir>/Toolchains/XcodeDefault.xctoolchain/usr/lib/swift/iphoneos`, when Xcode is installed.
fn xcode_swift_libraries(timeout: Duration) -> Option<PathBuf> {
    let output = tools::run_checked("xcode-select", ["-p"], timeout).ok()?;
    let developer_dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if developer_dir.is_empty() {
        return None;
    }
    Some(PathBuf::from(developer_dir).join("Toolchains/XcodeDefault.xctoolchain/usr/lib/swift/iphoneos"))
        .filter(|p| p.is_dir())
}
