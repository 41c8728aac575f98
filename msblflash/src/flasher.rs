//! The MSBL flashing sequence.
//!
//! [`MsblFlasher`] drives a [`BootloaderSession`] through a fixed sixteen-step
//! sequence ([`Step::SEQUENCE`]). The order is not configurable; only the
//! settle delay after each `exit` is.
//!
//! ## Example
//!
//! ```rust,no_run
//! use msblflash::{FlashOptions, MsblFlasher, MsblImage, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let image = MsblImage::from_file("firmware.msbl")?;
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let config = SerialConfig::new("/dev/ttyACM0");
//!         let mut flasher = MsblFlasher::open(&config, FlashOptions::default())?;
//!         let report = flasher.flash(&image, |event| println!("{event:?}"))?;
//!         println!("Now running {:?}", report.new_version);
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::image::msbl::MsblImage;
use crate::port::Port;
use crate::protocol::{Command, OperatingMode, Value};
use crate::session::BootloaderSession;
use log::{debug, info, warn};
use std::fmt;
use std::thread;
use std::time::Duration;

/// Time the sensor hub needs to come up after `exit`.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// One step of the flashing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// `exit`: force application mode.
    ExitToApplication,
    /// Wait for the application to start.
    SettleBeforeProbe,
    /// `sh_version`, best effort. The only step whose errors are suppressed.
    ProbeVersion,
    /// `bootldr`.
    EnterBootloader,
    /// `op_mode` must be `Bootloader`.
    VerifyBootloaderMode,
    /// `bootloader_version`.
    ReadBootloaderVersion,
    /// `page_size`, compared with the image.
    ReadPageSize,
    /// `num_pages <n>`.
    SetPageCount,
    /// `set_iv <nonce>`.
    SetIv,
    /// `set_auth <tag>`.
    SetAuth,
    /// `erase`.
    Erase,
    /// `flash` for every page, in order.
    FlashPages,
    /// `exit`: start the new application.
    ExitBootloader,
    /// Wait for the new application to start.
    SettleAfterExit,
    /// `op_mode` must be `Application`.
    VerifyApplicationMode,
    /// `sh_version` of the new firmware. Failure is reported only.
    ReadNewVersion,
}

impl Step {
    /// Execution order.
    pub const SEQUENCE: [Step; 16] = [
        Step::ExitToApplication,
        Step::SettleBeforeProbe,
        Step::ProbeVersion,
        Step::EnterBootloader,
        Step::VerifyBootloaderMode,
        Step::ReadBootloaderVersion,
        Step::ReadPageSize,
        Step::SetPageCount,
        Step::SetIv,
        Step::SetAuth,
        Step::Erase,
        Step::FlashPages,
        Step::ExitBootloader,
        Step::SettleAfterExit,
        Step::VerifyApplicationMode,
        Step::ReadNewVersion,
    ];

    /// 1-based position in [`Step::SEQUENCE`].
    pub fn number(self) -> usize {
        Self::SEQUENCE
            .iter()
            .position(|&s| s == self)
            .map_or(0, |i| i + 1)
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::ExitToApplication => "Resetting to application mode",
            Self::SettleBeforeProbe | Self::SettleAfterExit => {
                "Waiting for the sensor hub to initialize"
            },
            Self::ProbeVersion => "Retrieving current firmware version",
            Self::EnterBootloader => "Entering bootloader mode",
            Self::VerifyBootloaderMode => "Verifying bootloader mode",
            Self::ReadBootloaderVersion => "Reading bootloader version",
            Self::ReadPageSize => "Reading bootloader page size",
            Self::SetPageCount => "Setting number of pages",
            Self::SetIv => "Setting initialization vector",
            Self::SetAuth => "Setting authentication bytes",
            Self::Erase => "Erasing application flash",
            Self::FlashPages => "Flashing pages",
            Self::ExitBootloader => "Exiting bootloader mode",
            Self::VerifyApplicationMode => "Verifying application mode",
            Self::ReadNewVersion => "Retrieving new firmware version",
        }
    }
}

impl Step {
    /// Mode the device is in while this step talks to it, if known.
    ///
    /// The first `exit` may reach either mode.
    pub fn device_mode(self) -> Option<OperatingMode> {
        match self {
            Self::ExitToApplication | Self::SettleBeforeProbe | Self::SettleAfterExit => None,
            Self::ProbeVersion
            | Self::EnterBootloader
            | Self::VerifyApplicationMode
            | Self::ReadNewVersion => Some(OperatingMode::Application),
            Self::VerifyBootloaderMode
            | Self::ReadBootloaderVersion
            | Self::ReadPageSize
            | Self::SetPageCount
            | Self::SetIv
            | Self::SetAuth
            | Self::Erase
            | Self::FlashPages
            | Self::ExitBootloader => Some(OperatingMode::Bootloader),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/16] {}", self.number(), self.description())
    }
}

/// Tuning knobs for [`MsblFlasher`].
#[derive(Debug, Clone)]
pub struct FlashOptions {
    /// Delay after each `exit` before talking to the device again.
    pub settle_delay: Duration,
}

impl Default for FlashOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl FlashOptions {
    /// Set the settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}

/// Progress notifications emitted while flashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashEvent {
    /// A step is about to run.
    StepStarted(Step),
    /// Result of the pre-flash version probe (`None` if it failed).
    PreviousVersion(Option<String>),
    /// Bootloader version reported by the device.
    BootloaderVersion(String),
    /// The bootloader expects a different page size than the image has.
    PageSizeMismatch {
        /// Page size declared in the image header.
        image: u16,
        /// Value the device returned for `page_size`.
        device: Value,
    },
    /// A page was accepted by the bootloader.
    PageFlashed {
        /// 1-based page index.
        page: usize,
        /// Total number of pages.
        total: usize,
    },
    /// Version of the freshly flashed firmware (`None` if it could not be read).
    NewVersion(Option<String>),
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReport {
    /// Firmware version before flashing, if the probe succeeded.
    pub previous_version: Option<String>,
    /// Bootloader version.
    pub bootloader_version: String,
    /// Page size reported by the bootloader.
    pub device_page_size: Value,
    /// Whether the device page size equals the image page size.
    pub page_size_matches: bool,
    /// Number of pages written.
    pub pages_flashed: usize,
    /// Firmware version after flashing, if it could be read.
    pub new_version: Option<String>,
}

/// Flashes MSBL images through the sensor-hub bootloader.
pub struct MsblFlasher<P: Port> {
    session: BootloaderSession<P>,
    options: FlashOptions,
}

impl<P: Port> MsblFlasher<P> {
    /// Create a flasher on an already opened port.
    pub fn new(port: P, options: FlashOptions) -> Self {
        Self {
            session: BootloaderSession::new(port),
            options,
        }
    }

    /// Get a reference to the session.
    pub fn session(&self) -> &BootloaderSession<P> {
        &self.session
    }

    /// Get a mutable reference to the session.
    pub fn session_mut(&mut self) -> &mut BootloaderSession<P> {
        &mut self.session
    }

    /// Consume the flasher and return the underlying port.
    pub fn into_port(self) -> P {
        self.session.into_port()
    }

    /// Run the full sequence for `image`.
    ///
    /// `observer` is called before every step and for every notable result.
    /// The first fatal error aborts the run; the device is left wherever the
    /// sequence stopped.
    pub fn flash<F>(&mut self, image: &MsblImage, mut observer: F) -> Result<FlashReport>
    where
        F: FnMut(&FlashEvent),
    {
        let header = image.header();
        let total = image.page_count();
        info!(
            "Flashing {} page(s) of {} bytes for {} via {}",
            total,
            image.payload_len(),
            header.target_name(),
            self.session.port().name()
        );

        self.session.discard_input()?;

        let mut report = FlashReport {
            previous_version: None,
            bootloader_version: String::new(),
            device_page_size: Value::Text(String::new()),
            page_size_matches: false,
            pages_flashed: 0,
            new_version: None,
        };

        for step in Step::SEQUENCE {
            debug!("{step}");
            observer(&FlashEvent::StepStarted(step));
            self.run_step(step, image, &mut report, &mut observer)
                .map_err(|err| match step.device_mode() {
                    Some(mode) => err.in_mode(mode),
                    None => err,
                })?;
        }

        info!("Flashing complete!");
        Ok(report)
    }

    fn run_step<F>(
        &mut self,
        step: Step,
        image: &MsblImage,
        report: &mut FlashReport,
        observer: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&FlashEvent),
    {
        match step {
            Step::ExitToApplication | Step::ExitBootloader => {
                self.session.send_command(&Command::Exit)?;
            },
            Step::SettleBeforeProbe | Step::SettleAfterExit => self.settle(),
            Step::ProbeVersion => {
                report.previous_version = self
                    .session
                    .try_send_command(&Command::ShVersion)?
                    .map(|v| v.to_string());
                match &report.previous_version {
                    Some(v) => info!("Current firmware is v{v}"),
                    None => warn!(
                        "Could not read the current firmware version; the device may be blank"
                    ),
                }
                observer(&FlashEvent::PreviousVersion(report.previous_version.clone()));
            },
            Step::EnterBootloader => {
                self.session.send_command(&Command::EnterBootloader)?;
            },
            Step::VerifyBootloaderMode => {
                self.session.expect_mode(OperatingMode::Bootloader)?;
            },
            Step::ReadBootloaderVersion => {
                let version = self.session.bootloader_version()?;
                info!("Bootloader version: {version}");
                observer(&FlashEvent::BootloaderVersion(version.clone()));
                report.bootloader_version = version;
            },
            Step::ReadPageSize => {
                let device = self.session.send_command(&Command::PageSize)?;
                report.page_size_matches = device.as_int() == Some(i64::from(image.page_size()));
                if report.page_size_matches {
                    debug!("Bootloader page size matches the image");
                } else {
                    warn!(
                        "Image page size is {} but the bootloader reports {}",
                        image.page_size(),
                        device
                    );
                    observer(&FlashEvent::PageSizeMismatch {
                        image: image.page_size(),
                        device: device.clone(),
                    });
                }
                report.device_page_size = device;
            },
            Step::SetPageCount => {
                self.session
                    .send_command(&Command::NumPages(image.header().num_pages))?;
            },
            Step::SetIv => {
                self.session.send_command(&Command::SetIv(*image.nonce()))?;
            },
            Step::SetAuth => {
                self.session.send_command(&Command::SetAuth(*image.auth()))?;
            },
            Step::Erase => {
                self.session.send_command(&Command::Erase)?;
            },
            Step::FlashPages => {
                let total = image.page_count();
                for (i, page) in image.pages().iter().enumerate() {
                    let index = i + 1;
                    self.session
                        .flash_page(page)
                        .map_err(|source| Error::Page {
                            page: index,
                            total,
                            source: Box::new(source),
                        })?;
                    report.pages_flashed = index;
                    debug!("Page {index}/{total} flashed");
                    observer(&FlashEvent::PageFlashed { page: index, total });
                }
            },
            Step::VerifyApplicationMode => {
                self.session.expect_mode(OperatingMode::Application)?;
            },
            Step::ReadNewVersion => {
                report.new_version = match self.session.firmware_version() {
                    Ok(v) => {
                        info!("Firmware is now v{v}");
                        Some(v)
                    },
                    Err(e) => {
                        warn!("Could not read the new firmware version: {e}");
                        None
                    },
                };
                observer(&FlashEvent::NewVersion(report.new_version.clone()));
            },
        }
        Ok(())
    }

    fn settle(&self) {
        let delay = self.options.settle_delay;
        if !delay.is_zero() {
            debug!("Sleeping {delay:?} to let the sensor hub initialize");
            thread::sleep(delay);
        }
    }
}

#[cfg(feature = "native")]
mod native_impl {
    use super::{FlashOptions, MsblFlasher, Result};
    use crate::port::{NativePort, SerialConfig};

    impl MsblFlasher<NativePort> {
        /// Open the serial port described by `config` and wrap it in a flasher.
        pub fn open(config: &SerialConfig, options: FlashOptions) -> Result<Self> {
            let port = NativePort::open(config)?;
            Ok(Self::new(port, options))
        }
    }
}
