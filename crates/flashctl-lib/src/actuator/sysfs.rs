//! Linux LED-class backend.
//!
//! A flash LED registered with the kernel LED class exposes
//! `<dir>/brightness` (read/write, `0` = off) and `<dir>/max_brightness`.
//! The five levels are spread evenly over `1..=max_brightness`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use super::*;

pub struct SysfsFlash {
    dir: PathBuf,
    max_brightness: u32,
    /// Level lit on the next switch-on.
    level: AtomicU8,
}

impl SysfsFlash {
    /// Bind to an LED class directory.
    ///
    /// Fails with `Unavailable` if the node is missing or reports a zero
    /// `max_brightness`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let max_path = dir.join("max_brightness");
        let max_brightness = read_u32(&max_path).map_err(|e| {
            ActuatorError::Unavailable(format!("{}: {e}", max_path.display()))
        })?;
        if max_brightness == 0 {
            return Err(ActuatorError::Unavailable(format!(
                "{}: max_brightness is 0",
                dir.display()
            )));
        }
        let flash = SysfsFlash {
            dir,
            max_brightness,
            level: AtomicU8::new(Intensity::DEFAULT.get()),
        };
        // Start from whatever level the flash is lit at, if any.
        if let Ok(raw) = flash.read_raw()
            && let Some(level) = Intensity::new(i64::from(flash.level_for(raw)))
        {
            flash.level.store(level.get(), Ordering::SeqCst);
        }
        log::debug!(
            "bound flash at {} (max_brightness {max_brightness})",
            flash.dir.display()
        );
        Ok(flash)
    }

    /// Raw brightness for a level: `round(level * max / 5)`, at least 1.
    fn raw_for(&self, level: Intensity) -> u32 {
        let raw = (2 * u64::from(level.get()) * u64::from(self.max_brightness) + 5) / 10;
        u32::try_from(raw).unwrap_or(self.max_brightness).max(1)
    }

    /// Level for a raw brightness: `round(raw * 5 / max)`. May fall outside
    /// `1..=5` for readings past `max_brightness`.
    fn level_for(&self, raw: u32) -> u8 {
        if raw == 0 {
            return 0;
        }
        let level = (10 * u64::from(raw) + u64::from(self.max_brightness))
            / (2 * u64::from(self.max_brightness));
        level.min(u64::from(u8::MAX)) as u8
    }

    fn brightness_path(&self) -> PathBuf {
        self.dir.join("brightness")
    }

    fn read_raw(&self) -> Result<u32> {
        let path = self.brightness_path();
        read_u32(&path)
            .map_err(|e| ActuatorError::Unavailable(format!("{}: {e}", path.display())))
    }

    fn write_raw(&self, raw: u32) -> Result<()> {
        let path = self.brightness_path();
        // No `create`: a vanished node must surface as NotFound.
        std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .and_then(|mut f| f.write_all(format!("{raw}\n").as_bytes()))
            .map_err(|e| {
                let context = format!("{}: {e}", path.display());
                match e.kind() {
                    io::ErrorKind::NotFound => ActuatorError::Unavailable(context),
                    _ => ActuatorError::InvalidState(context),
                }
            })
    }
}

impl ActuatorClient for SysfsFlash {
    fn get_enabled_intensity(&self) -> Result<ActuatorState> {
        let raw = self.read_raw()?;
        Ok(ActuatorState {
            enabled: raw != 0,
            intensity: self.level_for(raw),
        })
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        let raw = if enabled {
            let level = Intensity::new(i64::from(self.level.load(Ordering::SeqCst)))
                .unwrap_or_default();
            self.raw_for(level)
        } else {
            0
        };
        self.write_raw(raw)
    }

    fn set_intensity(&self, level: Intensity) -> Result<()> {
        self.level.store(level.get(), Ordering::SeqCst);
        if self.read_raw()? != 0 {
            self.write_raw(self.raw_for(level))?;
        }
        Ok(())
    }
}

fn read_u32(path: &Path) -> io::Result<u32> {
    let text = std::fs::read_to_string(path)?;
    text.trim()
        .parse::<u32>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
