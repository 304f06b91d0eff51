use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use esprom::{
    command::DEFAULT_TIMEOUT,
    interface::ROM_BAUD,
    Config, Connection, Error, SerialInterface,
};
use log::{debug, LevelFilter};
use miette::Result;

const DEFAULT_PORT: &str = "/dev/ttyUSB0";

#[derive(Debug, Parser)]
#[command(about, version, disable_version_flag = true)]
struct Cli {
    /// Print version information
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    #[command(flatten)]
    connect: ConnectArgs,

    /// Increase verbosity of output
    #[arg(short = 'V', long, global = true)]
    verbose: bool,

    /// Suppress output, including error messages
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    subcommand: Commands,
}

#[derive(Debug, Args)]
struct ConnectArgs {
    /// Serial port device, e.g. /dev/ttyUSB0
    #[arg(short = 'p', long, global = true)]
    port: Option<String>,

    /// Baud rate of the serial port
    #[arg(short = 'b', long, global = true)]
    baud: Option<u32>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Hardware reset using RTS/DTR
    Reset,
    /// Start the user firmware
    Run,
    /// Read the chip id from the OTP region
    #[command(name = "chip_id")]
    ChipId,
    /// Read the SPI flash id
    #[command(name = "flash_id")]
    FlashId,
    /// Write firmware images to flash
    #[command(name = "write_flash")]
    WriteFlash(WriteFlashArgs),
    /// Download the flash contents to a file
    #[command(name = "read_flash")]
    ReadFlash(ReadFlashArgs),
    /// Erase the flash memory
    Erase,
    /// Open a terminal to the running firmware
    Terminal,
    /// Convert an ELF executable to a firmware image
    #[command(name = "elf2image")]
    Elf2Image(Elf2ImageArgs),
}

#[derive(Debug, Args)]
struct WriteFlashArgs {
    /// Offset and image pairs to write, e.g. 0x0000 firmware.bin
    #[arg(required = true, num_args = 2..)]
    images: Vec<String>,
}

#[derive(Debug, Args)]
struct ReadFlashArgs {
    /// File to save the flash contents to
    file: PathBuf,
}

#[derive(Debug, Args)]
struct Elf2ImageArgs {
    /// ELF executable to convert
    elf: PathBuf,
    /// File to save the firmware image to
    image: PathBuf,
}

fn main() -> Result<()> {
    miette::set_panic_hook();

    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Off
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    debug!("{:#?}", cli);

    match run(&cli) {
        Err(_) if cli.quiet => std::process::exit(1),
        result => result,
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load()?;

    let port = cli
        .connect
        .port
        .clone()
        .or_else(|| config.connection.serial.clone())
        .unwrap_or_else(|| DEFAULT_PORT.into());
    let baud = cli.connect.baud.or(config.connection.baud).unwrap_or(ROM_BAUD);

    let interface = SerialInterface::new(&port, baud, DEFAULT_TIMEOUT);
    let mut connection = Connection::new(interface);

    match &cli.subcommand {
        Commands::Reset | Commands::Run => {
            connection.reset_to_run()?;
        }
        Commands::ChipId => {
            let id = connection.read_chip_id()?;
            println!("Chip ID: {id:#010x}");
        }
        unsupported => {
            return Err(Error::UnsupportedCommand(command_name(unsupported).into()).into());
        }
    }

    Ok(())
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Reset => "reset",
        Commands::Run => "run",
        Commands::ChipId => "chip_id",
        Commands::FlashId => "flash_id",
        Commands::WriteFlash(_) => "write_flash",
        Commands::ReadFlash(_) => "read_flash",
        Commands::Erase => "erase",
        Commands::Terminal => "terminal",
        Commands::Elf2Image(_) => "elf2image",
    }
}
