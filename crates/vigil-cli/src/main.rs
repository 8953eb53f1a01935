use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vigil_core::{DetectionMethod, VisionModel};
use vigil_store::FaceStore;
use vigil_vision::HttpVision;

mod enroll;
mod replay;

#[derive(Parser)]
#[command(name = "vigil", version, about = "Face recognition with blink liveness")]
struct Cli {
    /// Enrollment database (defaults to $XDG_DATA_HOME/vigil/faces.db)
    #[arg(long, env = "VIGIL_DB_PATH", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct VisionArgs {
    /// Base URL of the vision sidecar
    #[arg(long, env = "VIGIL_VISION_URL", default_value = "http://127.0.0.1:8500")]
    vision_url: String,

    #[arg(long, env = "VIGIL_VISION_TIMEOUT_SECS", default_value_t = 10)]
    vision_timeout_secs: u64,

    /// Detector selector passed to the sidecar (hog or cnn)
    #[arg(long, env = "VIGIL_DETECTION_METHOD", default_value = "hog")]
    detection_method: String,
}

impl VisionArgs {
    fn vision(&self) -> Arc<dyn VisionModel> {
        Arc::new(HttpVision::new(
            &self.vision_url,
            Duration::from_secs(self.vision_timeout_secs),
        ))
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::new(self.detection_method.clone())
    }
}

#[derive(Subcommand)]
enum Command {
    /// Encode the single face in an image and store it
    Enroll {
        #[arg(long)]
        label: String,
        /// Contact used to look up reservations (e.g. an email address)
        #[arg(long)]
        contact: Option<String>,
        image: PathBuf,
        #[command(flatten)]
        vision: VisionArgs,
    },
    /// Store every photo of a <person>/<photo> directory tree
    Import {
        dir: PathBuf,
        #[command(flatten)]
        vision: VisionArgs,
    },
    /// List enrollments
    List,
    /// Remove an enrollment by id
    Remove { id: String },
    /// Run one session over a directory of frames, printing one result line per frame
    Replay(replay::ReplayArgs),
    /// Show gallery size
    Status,
}

fn default_db_path() -> PathBuf {
    let data_home = std::env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.local/share")
    });
    PathBuf::from(data_home).join("vigil/faces.db")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(default_db_path);
    let store = FaceStore::open(&db_path)
        .await
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;

    match cli.command {
        Command::Enroll {
            label,
            contact,
            image,
            vision,
        } => enroll::enroll(&store, label, contact, image, &vision).await,
        Command::Import { dir, vision } => enroll::import(&store, dir, &vision).await,
        Command::List => {
            let enrollments = store.list().await?;
            println!("{}", serde_json::to_string_pretty(&enrollments)?);
            Ok(())
        }
        Command::Remove { id } => {
            if !store.remove(&id).await? {
                bail!("no enrollment with id {id}");
            }
            println!("Removed {id}");
            Ok(())
        }
        Command::Replay(args) => replay::run(&store, args).await,
        Command::Status => {
            let gallery = store.load_gallery().await?;
            println!("Database: {}", db_path.display());
            println!("Enrollments: {}", gallery.len());
            println!("Identities: {}", gallery.identity_count());
            Ok(())
        }
    }
}
