use crate::cli::{Cli, Commands};
use std::process;
use std::time::Duration;
use streamcast::{config, engine};
use tracing::{error, info};

use engine::launch::RetryPolicy;
use engine::pipeline::BuildOptions;
use engine::types::{Protocol, StreamRequest};
use engine::{EncoderCandidate, PlatformProfile, StreamError};

pub fn run(mut cli: Cli) {
    // Handle subcommands first. The command is taken out so the global
    // overrides stay available to handlers like dry-run.
    if let Some(command) = cli.command.take() {
        match command {
            Commands::Devices { json } => handle_devices(json),
            Commands::Discover { json } => handle_discover(json),
            Commands::DryRun => handle_dry_run(cli),
            Commands::InitConfig => handle_init_config(),
        }
        return;
    }

    handle_stream(cli);
}

/// Merge CLI overrides over the config into one immutable request.
fn build_request(cli: &Cli, config: &config::Config) -> Result<StreamRequest, StreamError> {
    let protocol = cli.protocol.unwrap_or(config.stream.protocol);

    let resolution = match cli.resolution {
        Some(r) => r,
        None => config
            .stream
            .resolution
            .parse()
            .map_err(StreamError::Fatal)?,
    };

    let port = resolve_port(protocol, cli.port.or(match config.stream.port {
        0 => None,
        p => Some(p),
    }));

    Ok(StreamRequest {
        device: cli
            .device
            .clone()
            .unwrap_or_else(|| config.stream.device.clone().into()),
        resolution,
        pixel_format: cli
            .format
            .clone()
            .unwrap_or_else(|| config.stream.format.clone()),
        protocol,
        host: cli
            .server
            .clone()
            .unwrap_or_else(|| config.stream.server.clone()),
        port,
        stream_path: cli
            .path
            .clone()
            .unwrap_or_else(|| config.stream.stream_path.clone()),
        bitrate_kbps: cli.bitrate.unwrap_or(config.stream.bitrate_kbps),
    })
}

/// Auto-correct a port that obviously belongs to the other protocol; an
/// explicit unconventional port is respected.
fn resolve_port(protocol: Protocol, port: Option<u16>) -> u16 {
    match port {
        None => protocol.default_port(),
        Some(p) if p == other_protocol(protocol).default_port() => {
            info!(
                wrong = p,
                corrected = protocol.default_port(),
                "port belongs to the other protocol, using the conventional one"
            );
            protocol.default_port()
        }
        Some(p) => p,
    }
}

fn other_protocol(protocol: Protocol) -> Protocol {
    match protocol {
        Protocol::Udp => Protocol::Rtmp,
        Protocol::Rtmp => Protocol::Udp,
    }
}

/// Discover, verify, and select; the common front half of stream/dry-run.
fn prepare_encoder(
    request: &StreamRequest,
    verify_timeout: Duration,
) -> Result<(PlatformProfile, Vec<EncoderCandidate>), StreamError> {
    if !engine::devices::device_exists(&request.device.display().to_string()) {
        return Err(StreamError::Device(format!(
            "capture device {} does not exist",
            request.device.display()
        )));
    }

    let (profile, candidates) = engine::platform::discover()?;
    info!(
        kernel = %profile.kernel,
        model = profile.model.as_deref().unwrap_or("generic"),
        present = candidates.iter().filter(|c| c.present).count(),
        "platform discovered"
    );

    let candidates = engine::verify::verify_all(candidates, verify_timeout);
    Ok((profile, candidates))
}

fn compile_pipeline(cli: &Cli) -> Result<engine::PipelineSpec, StreamError> {
    let config = config::Config::load().unwrap_or_default();
    let request = build_request(cli, &config)?;

    let verify_timeout = Duration::from_millis(
        cli.verify_timeout_ms
            .unwrap_or(config.engine.verify_timeout_ms),
    );
    let (_, candidates) = prepare_encoder(&request, verify_timeout)?;
    let chosen = engine::select::select(&candidates, &request.pixel_format)?;

    let options = BuildOptions {
        rtmp_timeout_s: config.engine.rtmp_timeout_s,
        extra_encoder_props: config
            .engine
            .extra_encoder_props()
            .map_err(|e| StreamError::Fatal(format!("{:#}", e)))?,
    };
    engine::pipeline::build(&request, chosen, &options)
}

fn handle_stream(cli: Cli) {
    let config = config::Config::load().unwrap_or_default();
    let policy = RetryPolicy {
        max_attempts: config.engine.retry_max_attempts,
        base_delay: Duration::from_millis(config.engine.retry_base_delay_ms),
        max_delay: Duration::from_millis(config.engine.retry_max_delay_ms),
        stop_grace: Duration::from_millis(config.engine.stop_grace_ms),
    };

    let spec = match compile_pipeline(&cli) {
        Ok(spec) => spec,
        Err(e) => fail(e),
    };

    info!("pipeline:\n{}", spec.describe());
    info!(rendered = %spec.render(), "launching engine");

    if let Err(e) = engine::launch::run_supervised(&spec, &policy) {
        fail(e);
    }
}

fn handle_dry_run(cli: Cli) {
    match compile_pipeline(&cli) {
        Ok(spec) => {
            println!("Pipeline stages:");
            print!("{}", spec.describe());
            println!();
            println!("{}", spec.render());
        }
        Err(e) => fail(e),
    }
}

fn handle_devices(json: bool) {
    let devices = match engine::devices::enumerate() {
        Ok(devices) => devices,
        Err(e) => fail(e),
    };

    if json {
        match serde_json::to_string_pretty(&devices) {
            Ok(body) => println!("{}", body),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    if devices.is_empty() {
        println!("No video devices found.");
        return;
    }

    println!("Available video devices and supported formats:");
    for device in &devices {
        if device.formats.is_empty() {
            println!("  {}  (could not query - device may be in use)", device.path);
            continue;
        }
        let formats: Vec<String> = device
            .formats
            .iter()
            .map(|f| {
                if f.sizes.is_empty() {
                    f.fourcc.clone()
                } else {
                    format!("{} ({})", f.fourcc, f.sizes.join(", "))
                }
            })
            .collect();
        println!("  {}  {}", device.path, formats.join(", "));
    }
}

fn handle_discover(json: bool) {
    let config = config::Config::load().unwrap_or_default();
    let verify_timeout = Duration::from_millis(config.engine.verify_timeout_ms);

    let (profile, candidates) = match engine::platform::discover() {
        Ok(result) => result,
        Err(e) => fail(e),
    };
    let candidates = engine::verify::verify_all(candidates, verify_timeout);
    let selection = engine::select::select(&candidates, &config.stream.format)
        .map(|c| c.id)
        .ok();

    if json {
        #[derive(serde::Serialize)]
        struct Report<'a> {
            platform: &'a PlatformProfile,
            candidates: &'a [EncoderCandidate],
            selected: Option<&'a str>,
        }
        let report = Report {
            platform: &profile,
            candidates: &candidates,
            selected: selection,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(body) => println!("{}", body),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Platform: kernel {}", profile.kernel);
    if let Some(os) = &profile.os {
        println!("  OS: {}", os);
    }
    if let Some(model) = &profile.model {
        println!("  Model: {}", model);
    }
    println!();
    println!("Encoder candidates (highest tier first):");
    for candidate in &candidates {
        let state = if candidate.verified {
            "verified".to_string()
        } else if !candidate.present {
            "absent".to_string()
        } else {
            match candidate.verification_error {
                Some(err) => format!("failed: {}", err),
                None => "present".to_string(),
            }
        };
        println!(
            "  {:<16} {:<14} {}",
            candidate.id,
            candidate.tier.label(),
            state
        );
    }
    println!();
    match selection {
        Some(id) => println!("Selected: {}", id),
        None => println!("Selected: none (no encoder verified)"),
    }
}

fn handle_init_config() {
    if config::Config::exists() {
        match config::Config::load() {
            Ok(cfg) => {
                match config::Config::config_path() {
                    Ok(path) => println!("Config loaded successfully from {}", path.display()),
                    Err(e) => println!("Config loaded, but config path unknown: {:#}", e),
                }
                println!("{:#?}", cfg);
            }
            Err(e) => {
                eprintln!("Config exists but is invalid: {:#}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Creating default config...");
    let cfg = config::Config::default();
    if let Err(err) = cfg.save() {
        eprintln!("Failed to save default config: {:#}", err);
        process::exit(1);
    }
    match config::Config::config_path() {
        Ok(path) => println!("Default config saved to {}", path.display()),
        Err(e) => println!("Default config saved (path unknown): {:#}", e),
    }
}

fn fail(err: StreamError) -> ! {
    error!("{}", err);
    eprintln!("Error: {}", err);
    process::exit(err.exit_code());
}
