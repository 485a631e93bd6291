use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sha2::{Digest, Sha256};
use stegcore::{DEFAULT_SEED, ImageSteg, Preset, StegConfig, StegError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit status of `check` when the image carries no payload.
const NO_STEG_DATA: u8 = 5;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StegArgs {
    /// Embedding pipeline.
    #[arg(short, long, env = "STEG_PRESET", default_value_t = Preset::ResistanceHybrid)]
    preset: Preset,
    /// Seed of the element shuffle and the trellis submatrix.
    #[arg(long, env = "STEG_SEED", conflicts_with = "key")]
    seed: Option<u64>,
    /// Passphrase to derive the seed from.
    #[arg(short, long)]
    key: Option<String>,
    /// Do not frame the payload with a signature and length.
    #[arg(long)]
    no_header: bool,
    /// Do not add Reed-Solomon parity.
    #[arg(long)]
    no_ecc: bool,
    /// Share of payload bytes the parity can repair.
    #[arg(long, default_value_t = 0.5)]
    error_rate: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Hide a message in an image.
    Encode {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
        message: Option<String>,
        /// Read the payload from a file instead.
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// JPEG output quality.
        #[arg(long, default_value_t = 95)]
        quality: u8,
        #[command(flatten)]
        steg: StegArgs,
    },
    /// Recover a hidden message.
    Decode {
        #[arg(short, long)]
        input: PathBuf,
        /// Write the payload to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Payload length in bytes, required with --no-header.
        #[arg(short, long)]
        length: Option<usize>,
        /// Print the payload as hex.
        #[arg(long)]
        hex: bool,
        #[command(flatten)]
        steg: StegArgs,
    },
    /// Print how many payload bytes an image can hold.
    Capacity {
        #[arg(short, long)]
        input: PathBuf,
        #[command(flatten)]
        steg: StegArgs,
    },
    /// Tell whether an image carries a payload header.
    Check {
        #[arg(short, long)]
        input: PathBuf,
        #[command(flatten)]
        steg: StegArgs,
    },
}

impl StegArgs {
    fn config(&self) -> StegConfig {
        StegConfig::default()
            .with_preset(self.preset)
            .with_default_header(!self.no_header)
            .with_error_correction(!self.no_ecc)
            .with_error_rate(self.error_rate)
    }

    fn seed(&self) -> u64 {
        match (&self.key, self.seed) {
            (Some(key), _) => seed_from_key(key),
            (None, Some(seed)) => seed,
            (None, None) => DEFAULT_SEED,
        }
    }
}

/// First eight bytes of the passphrase's SHA-256 digest.
fn seed_from_key(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn read(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Encode {
            input,
            output,
            message,
            file,
            quality,
            steg,
        } => {
            let payload = match (message, file) {
                (Some(message), _) => message.into_bytes(),
                (None, Some(file)) => read(&file)?,
                (None, None) => anyhow::bail!("either --message or --file is required"),
            };
            let engine = ImageSteg::new(steg.config().with_jpeg_quality(quality));
            let stego = engine.encode_with_seed(&read(&input)?, &payload, steg.seed())?;
            std::fs::write(&output, stego).with_context(|| format!("cannot write {}", output.display()))?;
            info!(bytes = payload.len(), output = %output.display(), "encoding done");
        }

        Commands::Decode {
            input,
            output,
            length,
            hex,
            steg,
        } => {
            let engine = ImageSteg::new(steg.config());
            let stego = read(&input)?;
            let payload = match length {
                Some(length) => engine.decode_length_with_seed(length, &stego, steg.seed())?,
                None if steg.no_header => anyhow::bail!("--length is required with --no-header"),
                None => engine.decode_with_seed(&stego, steg.seed())?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, &payload).with_context(|| format!("cannot write {}", path.display()))?
                }
                None if hex => println!("{}", hex::encode(&payload)),
                None => println!("{}", String::from_utf8_lossy(&payload)),
            }
        }

        Commands::Capacity { input, steg } => {
            let capacity = ImageSteg::new(steg.config()).image_capacity(&read(&input)?)?;
            println!("{capacity}");
        }

        Commands::Check { input, steg } => {
            let engine = ImageSteg::new(steg.config());
            if engine.is_steganographic_data_with_seed(&read(&input)?, steg.seed())? {
                println!("payload header found");
            } else {
                println!("no payload header found");
                return Ok(ExitCode::from(NO_STEG_DATA));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            let code = err.downcast_ref::<StegError>().map_or(1, StegError::exit_code);
            ExitCode::from(code)
        }
    }
}
