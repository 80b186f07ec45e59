//! AlienFX CLI tool.
//!
//! Drives the lighting zones of Alienware laptops over the AlienFX HID
//! protocol, as spoken by the Alienware 13 R3. Older controllers with 9-byte
//! packets are supported through `--legacy`.

use std::process;
use std::str::FromStr;

use clap::builder::EnumValueParser;
use clap::{
    crate_description, crate_name, crate_version, value_parser, Arg, ArgAction, ArgMatches,
    Command, ValueEnum,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use alienfx::command::{PowerState, Rgb, DEFAULT_TEMPO};
use alienfx::controller::Controller;
use alienfx::packet::Generation;
use alienfx::theme::{Effect, ThemeFile};
use alienfx::transport::HidTransport;
use alienfx::zone::{Zone, ZoneMask};
use alienfx::{Result, PRODUCT_ID, VENDOR_ID};

/// Lighting effect selection.
#[derive(ValueEnum, Default, PartialEq, Eq, Debug, Copy, Clone)]
enum CliEffect {
    #[default]
    Set,
    Blink,
    Morph,
}

fn main() {
    let matches = cli();
    init_logging(matches.get_count("verbose"));

    let generation =
        if matches.get_flag("legacy") { Generation::LEGACY } else { Generation::MODERN };

    let result = match matches.subcommand() {
        Some(("apply", matches)) => apply(matches, generation),
        Some(("set", matches)) => set(matches, generation),
        Some(("on", _)) => controller(generation).all_lights_on(),
        Some(("off", _)) => controller(generation).all_lights_off(),
        Some(("status", _)) => status(generation),
        Some(("decode", matches)) => decode(matches, generation),
        _ => unreachable!("subcommand is required"),
    };

    if let Err(err) = result {
        eprintln!("\x1b[31mError:\x1b[0m {err}");
        process::exit(if err.is_fatal() { 2 } else { 1 });
    }
}

/// Apply a theme file to the controller.
fn apply(matches: &ArgMatches, generation: Generation) -> Result<()> {
    let path = matches.get_one::<String>("theme").expect("required argument");

    let compiled = ThemeFile::load(path)?.compile()?;
    if compiled.is_semantically_empty() {
        println!("Theme has no zone effects, nothing to apply.");
        return Ok(());
    }

    controller(generation).apply(&compiled)?;

    println!("\x1b[32mSuccessfully applied theme.\x1b[0m");
    Ok(())
}

/// Run one effect on a set of zones.
fn set(matches: &ArgMatches, generation: Generation) -> Result<()> {
    let zones: ZoneMask = match matches.get_many::<Zone>("zone") {
        Some(zones) => zones.copied().collect(),
        None => ZoneMask::all(),
    };

    let tempo = *matches.get_one::<u16>("tempo").unwrap_or(&DEFAULT_TEMPO);
    let save_for = matches.get_one::<PowerState>("save").copied();

    // Colors left unspecified are picked at random, like in themes.
    let color = parse_color(matches, "color")?.unwrap_or_else(Rgb::random);
    let effect = match matches.get_one::<CliEffect>("effect").unwrap_or(&CliEffect::Set) {
        CliEffect::Set => Effect::Set(color),
        CliEffect::Blink => Effect::Blink(color),
        CliEffect::Morph => {
            let end = parse_color(matches, "color2")?.unwrap_or_else(Rgb::random);
            Effect::Morph(color, end)
        },
    };

    controller(generation).set_zones(zones, effect, tempo, save_for)?;

    println!("\x1b[32mSuccessfully applied changes.\x1b[0m");
    Ok(())
}

/// Query controller readiness.
fn status(generation: Generation) -> Result<()> {
    if controller(generation).status()? {
        println!("\x1b[32mController is ready.\x1b[0m");
    } else {
        println!("\x1b[33mController is busy.\x1b[0m");
    }
    Ok(())
}

/// Decode a raw packet into a human readable description.
fn decode(matches: &ArgMatches, generation: Generation) -> Result<()> {
    let hex = matches.get_one::<String>("packet").expect("required argument");

    let packet = match parse_hex(hex) {
        Some(packet) => packet,
        None => {
            eprintln!("\x1b[31mPacket '{hex}' is not a hex byte string.\x1b[0m");
            process::exit(1);
        },
    };

    println!("{}", generation.decode(&packet)?);
    Ok(())
}

/// Controller handle for the Alienware 13 R3.
fn controller(generation: Generation) -> Controller<HidTransport> {
    let transport = HidTransport::new(VENDOR_ID, PRODUCT_ID, generation.packet_len());
    Controller::new(transport, generation)
}

/// Read an optional color argument in the `0xRRGGBB` format.
fn parse_color(matches: &ArgMatches, name: &str) -> Result<Option<Rgb>> {
    matches.get_one::<String>(name).map(|color| Rgb::from_str(color)).transpose()
}

/// Parse a hex byte string, ignoring whitespace and colon separators.
fn parse_hex(hex: &str) -> Option<Vec<u8>> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    if !hex.is_ascii() || hex.len() % 2 != 0 {
        return None;
    }

    (0..hex.len()).step_by(2).map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok()).collect()
}

/// Initialize logging at the level selected on the CLI.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", crate_name!(), level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Get clap CLI parameters.
fn cli() -> ArgMatches {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("legacy")
                .help("Use the 9-byte packet layout of older controllers")
                .long("legacy")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .help("Increase log verbosity")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply a theme file")
                .arg(Arg::new("theme").help("Path to the theme file").required(true)),
        )
        .subcommand(
            Command::new("set")
                .about("Run one effect on a set of zones")
                .arg(
                    Arg::new("zone")
                        .help("Zone to light up, repeatable [default: all zones]")
                        .long("zone")
                        .short('z')
                        .ignore_case(true)
                        .action(ArgAction::Append)
                        .value_parser(EnumValueParser::<Zone>::new()),
                )
                .arg(
                    Arg::new("effect")
                        .help("Lighting effect")
                        .long("effect")
                        .short('e')
                        .ignore_case(true)
                        .value_parser(EnumValueParser::<CliEffect>::new()),
                )
                .arg(Arg::new("color").help("Effect color [0xRRGGBB]").long("color").short('c'))
                .arg(Arg::new("color2").help("Second morph color [0xRRGGBB]").long("color2"))
                .arg(
                    Arg::new("tempo")
                        .help("Blink/morph speed in milliseconds [default: 200]")
                        .long("tempo")
                        .short('t')
                        .value_parser(value_parser!(u16)),
                )
                .arg(
                    Arg::new("save")
                        .help("Additionally save the effect for a power state")
                        .long("save")
                        .ignore_case(true)
                        .value_parser(EnumValueParser::<PowerState>::new()),
                ),
        )
        .subcommand(Command::new("on").about("Reset all zones to their power-on baseline"))
        .subcommand(Command::new("off").about("Turn all zones off"))
        .subcommand(Command::new("status").about("Query controller readiness"))
        .subcommand(
            Command::new("decode")
                .about("Decode a raw command packet")
                .arg(Arg::new("packet").help("Packet as a hex byte string").required(true)),
        )
        .get_matches()
}
