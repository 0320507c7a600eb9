//! Command-line options (§ "process wiring"). Grounded on `ReadOptions` in
//! `ue.cpp`: `-c` config file, `-i` IMSI override, `-n` UE count, `-l`
//! disables the (not-yet-built) command interface, `-r` skips routing
//! configuration. Parsed by hand with `std::env::args` rather than
//! pulling in an argument-parsing crate for a handful of flags.

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub config_file: String,
    pub imsi: Option<String>,
    pub count: u32,
    pub disable_cmd: bool,
    pub no_routing_configs: bool,
}

pub fn parse_args() -> Options {
    let mut config_file = None;
    let mut imsi = None;
    let mut count = 1u32;
    let mut disable_cmd = false;
    let mut no_routing_configs = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => config_file = args.next(),
            "-i" | "--imsi" => imsi = args.next(),
            "-n" | "--num-of-UE" => {
                count = args
                    .next()
                    .and_then(|v| v.parse().ok())
                    .filter(|v| *v > 0 && *v <= 512)
                    .unwrap_or_else(|| {
                        eprintln!("invalid number of UEs: must be in 1..=512");
                        std::process::exit(1);
                    });
            }
            "-l" | "--disable-cmd" => disable_cmd = true,
            "-r" | "--no-routing-config" => no_routing_configs = true,
            other => eprintln!("ignoring unrecognized argument: {other}"),
        }
    }

    let config_file = config_file.unwrap_or_else(|| {
        eprintln!("usage: ue-runner -c <config-file> [options...]");
        std::process::exit(1);
    });

    Options {
        config_file,
        imsi,
        count,
        disable_cmd,
        no_routing_configs,
    }
}
