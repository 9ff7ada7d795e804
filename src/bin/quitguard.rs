// quitguard CLI - drive the PIN lock and journal codec from a terminal
// Uses the same session facade the app UI does, over a file-backed store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use quitguard::config_file::Config;
use quitguard::constants::{AUTO_LOCK_MAX_SECONDS, AUTO_LOCK_MIN_SECONDS};
use quitguard::notice::{Notice, NoticeSink};
use quitguard::{AppState, Session};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// PIN lock and journal obfuscation for the quit-smoking companion app
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "PIN lock and journal obfuscation for the quit-smoking companion app",
    long_about = "PIN lock and journal obfuscation for the quit-smoking companion app.

Runs the same lock policy the app uses against a local store file:
 - PIN of at least 4 characters
 - 5 wrong attempts lock verification for 5 minutes
 - the session re-locks after 5 minutes in the background

Journal text can be obfuscated with a key derived from the PIN. This only
keeps it from being readable in the raw store; it is not encryption you
should trust against a determined attacker.

CONFIGURATION:
  Optional config file (store location and timeouts):
    ~/.config/quitguard/config.toml
  Environment overrides:
    QUITGUARD_AUTO_LOCK, QUITGUARD_LOCKOUT (seconds)"
)]
struct Args {
    /// Security store file (overrides config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Auto-lock timeout in seconds (60-3600, overrides config file and environment)
    /// NOTE: Keep range in sync with AUTO_LOCK_* constants
    #[arg(long, global = true)]
    auto_lock: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show PIN, biometric and lock state
    Status,
    /// Set up a new PIN
    Setup,
    /// Check a PIN
    Verify,
    /// Change the PIN
    Change,
    /// Turn the PIN off
    Disable,
    /// Biometric unlock settings
    Biometric {
        #[command(subcommand)]
        action: BiometricAction,
    },
    /// Obfuscate journal text
    Encrypt { text: String },
    /// Recover obfuscated journal text
    Decrypt { text: String },
    /// Record that the app went to the background
    Background,
    /// Return to the foreground and apply auto-lock
    Foreground,
    /// Erase all security data
    Reset,
    /// Write a config file with the default timeouts
    InitConfig {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BiometricAction {
    Enable,
    Disable,
    /// Unlock with a biometric confirmation
    Auth,
}

/// Prints notices the way the lock screen would show them
struct TerminalNoticeSink;

impl NoticeSink for TerminalNoticeSink {
    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::IncorrectPin { remaining_attempts } => {
                eprintln!("Incorrect PIN. {} attempts remaining.", remaining_attempts)
            }
            Notice::LockedOut { remaining } => {
                let secs = remaining.as_secs();
                eprintln!(
                    "Too many failed attempts. Try again in {} min {} sec.",
                    secs / 60,
                    secs % 60
                )
            }
        }
    }
}

fn prompt_pin(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read PIN")
}

fn prompt_new_pin() -> Result<String> {
    let pin = prompt_pin("New PIN: ")?;
    let confirm = prompt_pin("Confirm PIN: ")?;
    if pin != confirm {
        anyhow::bail!("Error: PINs do not match");
    }
    Ok(pin)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim(), "y" | "Y" | "yes"))
}

/// Verify the PIN interactively if the session starts locked
fn ensure_unlocked(session: &Session) -> Result<()> {
    if session.is_authenticated() {
        return Ok(());
    }
    let pin = prompt_pin("PIN: ")?;
    if !session.verify_pin(&pin) {
        anyhow::bail!("Session is locked");
    }
    Ok(())
}

fn report(ok: bool, success: &str, failure: &str) -> Result<()> {
    if ok {
        println!("{}", success);
        Ok(())
    } else {
        anyhow::bail!("{}", failure)
    }
}

fn print_status(session: &Session) -> Result<()> {
    let settings = session.security_settings();
    let policy = session.policy();

    println!("PIN:              {}", if settings.pin_enabled { "enabled" } else { "disabled" });
    println!("Biometric unlock: {}", if settings.biometric_enabled { "enabled" } else { "disabled" });
    println!(
        "Auto-lock:        {} ({}s)",
        if settings.auto_lock_enabled { "on" } else { "off" },
        settings.auto_lock_timeout.as_secs()
    );
    println!("Session:          {}", if session.is_locked() { "LOCKED" } else { "unlocked" });
    println!("Failed attempts:  {}", policy.failed_attempts()?);

    let remaining = policy.remaining_lock_time()?;
    if !remaining.is_zero() {
        println!("Lockout:          {}s remaining", remaining.as_secs());
    }
    Ok(())
}

fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Status => print_status(session),
        Command::Setup => {
            if session.is_locked() {
                anyhow::bail!("Session is locked; verify the PIN first");
            }
            if session.security_settings().pin_enabled {
                anyhow::bail!("A PIN is already set; use `change` or `disable`");
            }
            let pin = prompt_new_pin()?;
            report(session.setup_pin(&pin), "PIN set.", "Failed to set PIN")
        }
        Command::Verify => {
            let pin = prompt_pin("PIN: ")?;
            report(session.verify_pin(&pin), "PIN accepted.", "PIN rejected")
        }
        Command::Change => {
            let old = prompt_pin("Current PIN: ")?;
            let new = prompt_new_pin()?;
            report(session.change_pin(&old, &new), "PIN changed.", "Failed to change PIN")
        }
        Command::Disable => {
            let pin = prompt_pin("PIN: ")?;
            report(session.disable_pin(&pin), "PIN disabled.", "Failed to disable PIN")
        }
        Command::Biometric { action } => match action {
            BiometricAction::Enable => report(
                session.enable_biometric(),
                "Biometric unlock enabled.",
                "Failed to enable biometric unlock",
            ),
            BiometricAction::Disable => report(
                session.disable_biometric(),
                "Biometric unlock disabled.",
                "Failed to disable biometric unlock",
            ),
            BiometricAction::Auth => {
                let prompt = || confirm("Confirm it's you");
                report(
                    session.authenticate_with_biometric(&prompt),
                    "Unlocked.",
                    "Biometric unlock failed",
                )
            }
        },
        Command::Encrypt { text } => {
            ensure_unlocked(session)?;
            println!("{}", session.encrypt_text(&text)?);
            Ok(())
        }
        Command::Decrypt { text } => {
            ensure_unlocked(session)?;
            println!("{}", session.decrypt_text(&text)?);
            Ok(())
        }
        Command::Background => {
            session.handle_app_state(AppState::Background);
            println!("Activity recorded.");
            Ok(())
        }
        Command::Foreground => {
            session.handle_app_state(AppState::Active);
            println!("{}", if session.is_locked() { "LOCKED" } else { "unlocked" });
            Ok(())
        }
        Command::Reset => {
            if !confirm("Erase PIN, lockout state and encryption key?")? {
                println!("Aborted.");
                return Ok(());
            }
            report(
                session.clear_security_data(),
                "Security data erased.",
                "Failed to erase security data",
            )
        }
        Command::InitConfig { .. } => unreachable!("init-config runs before a session is opened"),
    }
}

/// Write a fresh config file, seeded from the command line overrides
fn init_config(store: Option<PathBuf>, auto_lock: Option<u64>, force: bool) -> Result<()> {
    let path = Config::config_path()?;
    let mut config = Config {
        store_path: store,
        ..Config::default()
    };
    if let Some(timeout) = auto_lock {
        config.auto_lock_timeout_secs = timeout;
    }
    config.validate()?;

    if config.write_new(&path, force)? {
        println!("Config written to {}", path.display());
    } else {
        println!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Command::InitConfig { force } = args.command {
        return init_config(args.store, args.auto_lock, force);
    }

    let cfg = Config::load().context("Failed to load configuration")?;

    let auto_lock = match args.auto_lock {
        Some(timeout) if (AUTO_LOCK_MIN_SECONDS..=AUTO_LOCK_MAX_SECONDS).contains(&timeout) => {
            info!("Auto-lock timeout set via --auto-lock argument: {} seconds", timeout);
            Some(timeout)
        }
        Some(timeout) => {
            anyhow::bail!(
                "Invalid --auto-lock value: {} (must be {}-{} seconds)",
                timeout,
                AUTO_LOCK_MIN_SECONDS,
                AUTO_LOCK_MAX_SECONDS
            );
        }
        None => None,
    };
    let policy = quitguard::resolve_policy_config(&cfg, auto_lock);

    let store_path = match args.store {
        Some(path) => path,
        None => cfg.store_path()?,
    };

    let session = quitguard::open_session(store_path, policy, Arc::new(TerminalNoticeSink))?;
    run(&session, args.command)
}
