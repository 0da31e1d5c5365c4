//! voxscreen - voice screening command line client
//!
//! Talks to a running voxscreen-gateway. Session state (logged-in user and
//! test history) is kept in the state directory between invocations.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use voxscreen_common::config::load_config;
use voxscreen_common::features::FEATURE_SPECS;
use voxscreen_common::Preset;
use voxscreen_client::capture::StreamCapture;
use voxscreen_client::display::{self, DashboardSummary, ModelPerformance};
use voxscreen_client::recorder::{clamp_limit, CaptureDevice, RecordingSession};
use voxscreen_client::registry::{NewPatient, PatientRegistry, StatusFilter};
use voxscreen_client::session::{FileStore, LoginTab, Registration};
use voxscreen_client::{
    AnalysisError, Analyzer, AppSession, AudioUpload, AudioUploadForm, GatewayClient,
    ManualEntryForm, SubmitOutcome,
};

#[derive(Debug, Parser)]
#[command(name = "voxscreen", version, about = "Parkinson's voice screening client")]
struct Args {
    /// Configuration file (overrides VOXSCREEN_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Gateway base URL
    #[arg(long, global = true, env = "VOXSCREEN_GATEWAY_URL")]
    gateway: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Predict from 22 acoustic feature values
    Predict {
        /// Start from a preset (healthy, parkinsons)
        #[arg(long)]
        preset: Option<Preset>,
        /// Comma-separated list of all 22 values in schema order
        #[arg(long, conflicts_with = "preset")]
        values: Option<String>,
        /// Override one feature, e.g. --set "MDVP:Fo(Hz)=150.2"
        #[arg(long = "set", value_name = "NAME=VALUE")]
        overrides: Vec<String>,
    },
    /// Analyze an audio file (.wav, .mp3, .m4a, up to 10 MB)
    Analyze { file: PathBuf },
    /// Record a voice sample and analyze it
    ///
    /// Stops at the recording ceiling or on Ctrl-C.
    Record {
        /// Where samples come from
        #[arg(long, value_enum, default_value_t = CaptureInput::Stdin)]
        input: CaptureInput,
        /// Sample rate of raw PCM read from stdin
        #[arg(long, default_value_t = 16_000)]
        sample_rate: u32,
        /// Recording ceiling in seconds (10 to 30; default from config)
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// List the acoustic features and their input ranges
    Features,
    /// Log in with a demo account
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Use the administrator login
        #[arg(long)]
        admin: bool,
    },
    /// Check a sign-up form
    Register(RegisterArgs),
    Logout,
    /// Show the logged-in patient's dashboard and test history
    Dashboard,
    /// Administrator patient registry
    #[command(subcommand)]
    Registry(RegistryCommand),
    /// Show the screening model's reference performance
    Performance,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CaptureInput {
    /// Raw signed 16-bit little-endian mono PCM on stdin
    Stdin,
    /// Default input device (requires the `microphone` feature)
    Microphone,
}

#[derive(Debug, ClapArgs)]
struct RegisterArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm_password: String,
}

#[derive(Debug, Subcommand)]
enum RegistryCommand {
    /// List patients
    List {
        /// all, positive, negative or pending
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// Case-insensitive name search
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Add a patient
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: String,
        /// male or female
        #[arg(long)]
        gender: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Run a voice test for a patient
    Test { id: String, file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    if let Some(gateway) = args.gateway {
        config.client.gateway_url = gateway;
    }

    let state_dir = config.client.resolved_state_dir();
    let store = FileStore::in_dir(&state_dir)
        .with_context(|| format!("Failed to open session store in {}", state_dir.display()))?;
    let mut session = AppSession::restore(Box::new(store))?;
    debug!("State directory: {}", state_dir.display());

    let transport = GatewayClient::new(
        &config.client.gateway_url,
        Duration::from_secs(config.client.request_timeout_secs),
    )?;
    info!("Gateway: {}", transport.base_url());
    let analyzer = Analyzer::new(Arc::new(transport), config.normalizer.build());

    match args.command {
        Command::Predict {
            preset,
            values,
            overrides,
        } => {
            let mut form = match values {
                Some(list) => ManualEntryForm::from_values(&parse_values(&list)?)?,
                None => ManualEntryForm::new(),
            };
            if let Some(preset) = preset {
                form.load_preset(preset);
            }
            for item in &overrides {
                let (name, value) = item
                    .split_once('=')
                    .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", item))?;
                let value: f64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid value for {}", name))?;
                form.set(name.trim(), value)?;
            }

            let outcome = form.submit(&analyzer).await;
            report(&mut session, outcome)?;
        }
        Command::Analyze { file } => {
            let mut form = AudioUploadForm::new();
            form.select_file(&file)?;
            let outcome = form.submit(&analyzer).await;
            report(&mut session, outcome)?;
        }
        Command::Record {
            input,
            sample_rate,
            seconds,
        } => {
            let limit = clamp_limit(seconds.unwrap_or(config.client.recording_limit_secs));
            let mut form = AudioUploadForm::new();
            form.start_recording(capture_device(input, sample_rate)?, limit)?;
            if let Some(session) = form.recording() {
                show_recording(session).await;
            }

            if form.settle_recording()?.is_none() {
                form.finish_recording()?;
            }
            let outcome = form.submit(&analyzer).await;
            report(&mut session, outcome)?;
        }
        Command::Features => {
            for spec in FEATURE_SPECS.iter() {
                println!(
                    "{:<18} {:<10} 0 .. {:<8} {}",
                    spec.name,
                    spec.group.label(),
                    spec.max_value,
                    spec.description
                );
            }
            println!();
            for preset in Preset::ALL {
                println!("preset {:<11} {}", preset.name(), preset.description());
            }
        }
        Command::Login {
            email,
            password,
            admin,
        } => {
            let tab = if admin {
                LoginTab::Admin
            } else {
                session.take_preferred_tab()?
            };
            let user = match tab {
                LoginTab::Admin => session.admin_login(&email, &password)?,
                LoginTab::Login | LoginTab::Register => session.login(&email, &password)?,
            };
            println!("Logged in as {} ({})", user.name, user.id);
        }
        Command::Register(form) => {
            let email = session.register(&Registration {
                name: form.name,
                email: form.email,
                password: form.password,
                confirm_password: form.confirm_password,
            })?;
            println!("Registration successful. Log in with: voxscreen login --email {} --password ...", email);
        }
        Command::Logout => {
            session.logout()?;
            println!("Logged out");
        }
        Command::Dashboard => {
            let user = session
                .user()
                .ok_or_else(|| anyhow!("Not logged in"))?;
            print!("{}", DashboardSummary::for_user(user).render());
            for entry in user.test_history.iter().rev() {
                println!(
                    "  {}  {}  {:<8} {}",
                    entry.id,
                    entry.date.format("%Y-%m-%d %H:%M"),
                    entry.result.verdict,
                    entry.result.probability.percent_label()
                );
            }
        }
        Command::Registry(command) => {
            if let Err(e) = session.require_admin() {
                // Next `voxscreen login` opens the administrator login
                session.request_admin_login()?;
                eprintln!("Log in as an administrator to use the registry.");
                return Err(e.into());
            }
            run_registry(&session, &analyzer, command).await?;
        }
        Command::Performance => {
            print!("{}", ModelPerformance::reference().render());
        }
    }

    Ok(())
}

async fn run_registry(
    session: &AppSession,
    analyzer: &Analyzer,
    command: RegistryCommand,
) -> Result<()> {
    let mut registry = PatientRegistry::seeded();
    let today = Utc::now().date_naive();

    match command {
        RegistryCommand::List { status, search } => {
            let patients = registry.list(session, status, &search)?;
            if patients.is_empty() {
                println!("No patients found matching your search");
            }
            for p in patients {
                println!(
                    "{:<4} {:<22} {:>3} {:<7} added {}  {:<8} last test {}",
                    p.id,
                    p.name,
                    p.age,
                    p.gender,
                    p.date_added,
                    p.status,
                    p.last_test
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        RegistryCommand::Add {
            name,
            age,
            gender,
            notes,
        } => {
            let form = NewPatient {
                name,
                age,
                gender,
                notes,
            };
            let patient = registry.add_patient(session, &form, today)?;
            println!("Patient added: {} ({})", patient.name, patient.id);
        }
        RegistryCommand::Test { id, file } => {
            let upload = AudioUpload::from_path(&file)?;
            let result = registry
                .run_test(session, &id, &upload, analyzer, today)
                .await?;
            let patient = registry.get(session, &id)?;
            println!(
                "Voice analysis completed for {}. Result: {}",
                patient.name, patient.status
            );
            print!("{}", display::render_result(&result));
        }
    }

    Ok(())
}

fn capture_device(input: CaptureInput, sample_rate: u32) -> Result<Box<dyn CaptureDevice>> {
    match input {
        CaptureInput::Stdin => Ok(Box::new(StreamCapture::new(std::io::stdin(), sample_rate))),
        #[cfg(feature = "microphone")]
        CaptureInput::Microphone => Ok(Box::new(voxscreen_client::capture::MicrophoneCapture::new())),
        #[cfg(not(feature = "microphone"))]
        CaptureInput::Microphone => Err(anyhow!(
            "voxscreen was built without microphone support; pipe PCM into --input stdin"
        )),
    }
}

/// Elapsed time on stderr until the ceiling or Ctrl-C
async fn show_recording(session: &RecordingSession) {
    let limit = session.limit_secs();
    let mut elapsed = session.watch_elapsed();

    loop {
        tokio::select! {
            changed = elapsed.changed() => {
                if changed.is_err() {
                    break;
                }
                let secs = *elapsed.borrow_and_update();
                eprint!("\rRecording... {}/{} s", secs, limit);
                if secs >= limit {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Recording stopped early");
                break;
            }
        }
    }
    eprintln!();
}

/// Print the outcome and save it to the user's history
fn report(
    session: &mut AppSession,
    outcome: std::result::Result<SubmitOutcome, AnalysisError>,
) -> Result<()> {
    let outcome = outcome.map_err(|e| anyhow!(e.user_message()))?;
    let result = outcome.result();

    print!("{}", display::render_result(result));
    if outcome.is_shown() {
        if let Some(entry) = session.record_result(result)? {
            println!("\nSaved to history as {}", entry.id);
        }
    }
    Ok(())
}

fn parse_values(list: &str) -> Result<Vec<f64>> {
    list.split(',')
        .map(|item| {
            item.trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid number '{}'", item.trim()))
        })
        .collect()
}
