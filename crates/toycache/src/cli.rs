use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "toycache",
    author,
    version,
    about = "Download a Shadertoy shader and compile it into the local cache"
)]
pub struct Cli {
    /// Shader id, `shadertoy://` handle, or shadertoy.com URL (e.g. `Xs23DR`).
    #[arg(value_name = "SHADER")]
    pub shader: String,

    /// Shadertoy API key.
    #[arg(value_name = "API_KEY")]
    pub api_key: String,
}
