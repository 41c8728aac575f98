//! Flash command implementation.

use {
    crate::{Cli, CliError, config::Config, use_fancy_output},
    anyhow::{Context, Result},
    console::style,
    indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle},
    msblflash::{FlashEvent, FlashOptions, MsblFlasher, MsblImage, SerialConfig, Step},
    std::path::Path,
};

/// Flash command implementation.
pub(crate) fn cmd_flash(
    cli: &Cli,
    config: &Config,
    firmware: &Path,
    settle_ms: Option<u64>,
) -> Result<()> {
    let Some(port) = config.port(cli.port.as_deref()) else {
        return Err(CliError::Usage(
            "no serial port given; use --port, MSBLFLASH_PORT or [connection] port in msblflash.toml"
                .into(),
        )
        .into());
    };

    let image = MsblImage::from_file(firmware)
        .with_context(|| format!("Failed to load {}", firmware.display()))?;

    if !cli.quiet {
        eprintln!(
            "{} Loaded {}",
            style("✓").green(),
            style(firmware.display()).cyan()
        );
        for line in image.describe().lines() {
            eprintln!("    {line}");
        }
    }

    let serial = SerialConfig::new(port.as_str())
        .with_baud_rate(config.baud(cli.baud))
        .with_timeout(config.timeout(cli.timeout_ms));
    let options = FlashOptions::default().with_settle_delay(config.settle_delay(settle_ms));

    if !cli.quiet {
        eprintln!(
            "Connecting to the bridge board on {} at {} baud...",
            style(&port).yellow(),
            serial.baud_rate
        );
    }
    let mut flasher = MsblFlasher::open(&serial, options)
        .with_context(|| format!("Failed to open serial port {port}"))?;

    let total = image.page_count();
    let pb = if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(total as u64);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb
    };

    let say = |line: String| {
        if cli.quiet {
            return;
        }
        if pb.is_hidden() {
            eprintln!("{line}");
        } else {
            pb.println(line);
        }
    };

    let result = flasher.flash(&image, |event| match event {
        FlashEvent::StepStarted(Step::FlashPages) => {
            say(Step::FlashPages.to_string());
            pb.set_message("flashing");
        },
        FlashEvent::StepStarted(step) => say(step.to_string()),
        FlashEvent::PreviousVersion(Some(version)) => {
            say(format!("    Current firmware is {}", style(format!("v{version}")).yellow()));
        },
        FlashEvent::PreviousVersion(None) => say(format!(
            "    {}",
            style("No firmware version reported; the device may be blank. Continuing...").cyan()
        )),
        FlashEvent::BootloaderVersion(version) => {
            say(format!("    Bootloader version: {}", style(version).yellow()));
        },
        FlashEvent::PageSizeMismatch { image, device } => say(format!(
            "    {} Image page size is {image} but the bootloader reports {device}",
            style("⚠").yellow()
        )),
        FlashEvent::PageFlashed { page, total } => {
            pb.set_position(*page as u64);
            if pb.is_hidden() && !cli.quiet {
                eprintln!("    Flashed page {page}/{total}");
            }
        },
        FlashEvent::NewVersion(Some(version)) => {
            say(format!("    New firmware is {}", style(format!("v{version}")).green()));
        },
        FlashEvent::NewVersion(None) => say(format!(
            "    {} Could not read the new firmware version",
            style("⚠").yellow()
        )),
    });

    let report = match result {
        Ok(report) => {
            pb.finish_and_clear();
            report
        },
        Err(err) => {
            pb.abandon();
            return Err(err).context("Flashing failed");
        },
    };

    if !cli.quiet {
        eprintln!(
            "\n{} Flashed {} page(s) successfully",
            style("✓").green().bold(),
            report.pages_flashed
        );
    }
    Ok(())
}
