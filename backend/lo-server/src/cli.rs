use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "lo-manager")]
#[command(about = "Supervises Last Oasis server tiles and keeps their Workshop mods current")]
#[command(version)]
pub struct Cli {
    /// Directory holding config.toml and state (defaults to $LO_CONFIG_DIR or ./.lo)
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Bring the fleet up without starting any tile
    #[arg(long)]
    pub no_autostart: bool,

    /// Validate the configuration, print its summary and exit
    #[arg(long)]
    pub check_config: bool,
}
