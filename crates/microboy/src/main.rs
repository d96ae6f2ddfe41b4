use anyhow::{bail, Context};
use microboy::{RunConfig, PASS_FINGERPRINT};
use microboy_cpu::Model;

fn usage() -> ! {
    eprintln!("Usage: microboy [--cgb] [--max-cycles N] <rom.gb>");
    std::process::exit(1);
}

fn parse_args() -> anyhow::Result<RunConfig> {
    let mut model = Model::Dmg;
    let mut max_cycles = None;
    let mut rom_path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--cgb" => model = Model::Cgb,
            "--max-cycles" => {
                let value = args.next().context("--max-cycles needs a value")?;
                let cycles = value
                    .parse::<u64>()
                    .with_context(|| format!("invalid cycle count '{value}'"))?;
                max_cycles = Some(cycles);
            }
            "-h" | "--help" => usage(),
            flag if flag.starts_with("--") => bail!("unknown flag '{flag}'"),
            path => rom_path = Some(path.to_string()),
        }
    }

    let Some(rom_path) = rom_path else {
        usage();
    };

    let config = RunConfig::builder().rom_path(rom_path).model(model);
    Ok(match max_cycles {
        Some(max_cycles) => config.max_cycles(max_cycles).build(),
        None => config.build(),
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = parse_args()?;
    let report = microboy::run(&config)?;
    let regs = report.registers;

    log::info!(
        "Stopped after {} cycles: finished={} AF={:04X} BC={:04X} DE={:04X} HL={:04X} SP={:04X} PC={:04X} [{}]",
        report.cycles,
        report.finished,
        regs.af(),
        regs.bc(),
        regs.de(),
        regs.hl(),
        regs.sp,
        regs.pc,
        regs.f,
    );

    if !report.finished {
        bail!(
            "ROM did not execute LD B,B within {} cycles",
            config.max_cycles
        );
    }
    if !report.passed() {
        bail!(
            "register fingerprint {:?} does not match pass pattern {:?}",
            report.fingerprint(),
            PASS_FINGERPRINT
        );
    }

    log::info!("Test passed");
    Ok(())
}
