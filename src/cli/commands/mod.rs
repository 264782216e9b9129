use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("pgpool2_exporter")
        .about("Pgpool-II metric exporter for Prometheus")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(built_info::GIT_COMMIT_HASH.unwrap_or(env!("CARGO_PKG_VERSION")))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("9719")
                .env("PGPOOL2_EXPORTER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("listen")
                .short('l')
                .long("listen")
                .help("IP address to bind to, IPv6 with IPv4 fallback when unset")
                .env("PGPOOL2_EXPORTER_LISTEN")
                .value_name("IP"),
        )
        .arg(
            Arg::new("metrics-path")
                .long("metrics-path")
                .help("Path under which to expose metrics")
                .default_value("/metrics")
                .env("PGPOOL2_EXPORTER_METRICS_PATH")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("dsn")
                .long("dsn")
                .help("Pgpool-II connection string")
                .env("DATA_SOURCE_NAME")
                .value_name("DSN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("dsn-user")
                .long("dsn-user")
                .help("User for the composed connection string, when --dsn is not set")
                .env("DATA_SOURCE_USER")
                .value_name("USER"),
        )
        .arg(
            Arg::new("dsn-pass")
                .long("dsn-pass")
                .help("Password for the composed connection string")
                .env("DATA_SOURCE_PASS")
                .value_name("PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("dsn-uri")
                .long("dsn-uri")
                .help("host[:port][/database][?params] for the composed connection string")
                .env("DATA_SOURCE_URI")
                .value_name("URI"),
        )
        .arg(
            Arg::new("connect-retry-interval")
                .long("connect-retry-interval")
                .help("Seconds between connection attempts at startup")
                .default_value("5")
                .env("PGPOOL2_EXPORTER_CONNECT_RETRY_INTERVAL")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity, -vv for debug")
                .action(ArgAction::Count),
        )
}
