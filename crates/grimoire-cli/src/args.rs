//! Command-line arguments.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "grimoire", about = "Coordination server for a single-flight generation engine")]
pub struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5001)]
    pub port: u16,

    /// Friendly model name reported to clients.
    #[arg(long, default_value = "grimoire/echo")]
    pub model_name: String,

    /// Concurrent-client limit. 0 disables queueing entirely; 1 keeps the
    /// legacy wait queue; higher values queue up to N-1 requests.
    #[arg(long, default_value_t = 1)]
    pub multiuser: u32,

    /// Context size the engine is allocated with.
    #[arg(long, default_value_t = 2048)]
    pub contextsize: u32,

    /// Bearer token required on generation and control endpoints.
    #[arg(long, env = "GRIMOIRE_PASSWORD")]
    pub password: Option<String>,

    /// Hide prompts and outputs in the logs.
    #[arg(long)]
    pub quiet: bool,

    /// Horde api key; setting it starts the embedded worker.
    #[arg(long, env = "GRIMOIRE_HORDE_KEY")]
    pub hordekey: Option<String>,

    /// Worker name announced to the horde cluster.
    #[arg(long, default_value = "grimoire-worker")]
    pub hordeworkername: String,

    /// Horde cluster URL.
    #[arg(long, default_value = grimoire_horde::DEFAULT_CLUSTER)]
    pub hordecluster: String,

    /// Output budget advertised to the cluster (and on the config API).
    #[arg(long, default_value_t = 256)]
    pub hordemaxlen: u32,

    /// Context budget advertised to the cluster (and on the config API).
    #[arg(long, default_value_t = 1024)]
    pub hordemaxctx: u32,
}
