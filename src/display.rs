use core::{convert::Infallible, fmt};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, OutputPin},
};

use crate::{
    bus::{replay, BusSink},
    sequence::InitSequence,
    DisplayError,
};

// MIPI DCS defaults used by most TFT controllers
const DEFAULT_SET_COLUMN_COMMAND: u8 = 0x2a; // CASET
const DEFAULT_SET_ROW_COMMAND: u8 = 0x2b; // RASET
const DEFAULT_WRITE_RAM_COMMAND: u8 = 0x2c; // RAMWR
const DEFAULT_COLOR_DEPTH: u8 = 16;

/// A requested rotation was not a multiple of 90 degrees.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct UnsupportedRotationError {
    pub degrees: i32,
}

impl fmt::Display for UnsupportedRotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Display rotation must be in 90 degree increments, got {}", self.degrees)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UnsupportedRotationError {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Display rotation must be in 90 degree increments, got {}",
            self.degrees
        );
    }
}

#[cfg(feature = "ufmt")]
impl ufmt::uDisplay for UnsupportedRotationError {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        ufmt::uwrite!(
            w,
            "Display rotation must be in 90 degree increments, got {}",
            self.degrees
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
/// Clockwise rotation of the display content.
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Accepts any multiple of 90, including negative values and values past 360.
    pub fn from_degrees(degrees: i32) -> Result<Self, UnsupportedRotationError> {
        if degrees % 90 != 0 {
            return Err(UnsupportedRotationError { degrees });
        }
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            _ => Ok(Rotation::Deg270),
        }
    }

    pub const fn degrees(&self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether the logical axes are swapped relative to the controller's native axes.
    pub const fn is_transposed(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = UnsupportedRotationError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
    }
}

impl From<&Rotation> for &'static str {
    fn from(rotation: &Rotation) -> Self {
        match rotation {
            Rotation::Deg0 => "0",
            Rotation::Deg90 => "90",
            Rotation::Deg180 => "180",
            Rotation::Deg270 => "270",
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Rotation {
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl ufmt::uDisplay for Rotation {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

/// Geometry and controller command set of a display. `width` and `height` are in the
/// controller's native orientation.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct DisplayConfig {
    width: u16,
    height: u16,
    colstart: u16,
    rowstart: u16,
    rotation: Rotation,
    color_depth: u8,
    set_column_command: u8,
    set_row_command: u8,
    write_ram_command: u8,
    set_vertical_scroll: u8,
}

impl DisplayConfig {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            colstart: 0,
            rowstart: 0,
            rotation: Rotation::Deg0,
            color_depth: DEFAULT_COLOR_DEPTH,
            set_column_command: DEFAULT_SET_COLUMN_COMMAND,
            set_row_command: DEFAULT_SET_ROW_COMMAND,
            write_ram_command: DEFAULT_WRITE_RAM_COMMAND,
            set_vertical_scroll: 0,
        }
    }

    /// Index of the first visible column in controller memory.
    pub fn with_colstart(mut self, colstart: u16) -> Self {
        self.colstart = colstart;
        self
    }

    /// Index of the first visible row in controller memory.
    pub fn with_rowstart(mut self, rowstart: u16) -> Self {
        self.rowstart = rowstart;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Bits of color per transmitted pixel.
    pub fn with_color_depth(mut self, color_depth: u8) -> Self {
        self.color_depth = color_depth;
        self
    }

    pub fn with_set_column_command(mut self, command: u8) -> Self {
        self.set_column_command = command;
        self
    }

    pub fn with_set_row_command(mut self, command: u8) -> Self {
        self.set_row_command = command;
        self
    }

    pub fn with_write_ram_command(mut self, command: u8) -> Self {
        self.write_ram_command = command;
        self
    }

    /// Command that sets the first row shown. `0` means the controller has none.
    pub fn with_set_vertical_scroll(mut self, command: u8) -> Self {
        self.set_vertical_scroll = command;
        self
    }

    /// Logical width after rotation
    pub fn width(&self) -> u16 {
        if self.rotation.is_transposed() {
            self.height
        } else {
            self.width
        }
    }

    /// Logical height after rotation
    pub fn height(&self) -> u16 {
        if self.rotation.is_transposed() {
            self.width
        } else {
            self.height
        }
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn color_depth(&self) -> u8 {
        self.color_depth
    }

    fn colstart(&self) -> u16 {
        if self.rotation.is_transposed() {
            self.rowstart
        } else {
            self.colstart
        }
    }

    fn rowstart(&self) -> u16 {
        if self.rotation.is_transposed() {
            self.colstart
        } else {
            self.rowstart
        }
    }
}

/// Stand-in backlight for displays without a backlight pin.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBacklight;

impl ErrorType for NoBacklight {
    type Error = Infallible;
}

impl OutputPin for NoBacklight {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A display controller reachable over `BUS` and configured by an init sequence.
pub struct Display<'a, BUS, DELAY, BL = NoBacklight>
where
    BUS: BusSink,
    DELAY: DelayNs,
    BL: OutputPin,
{
    bus: BUS,
    delay: DELAY,
    backlight: Option<BL>,
    sequence: InitSequence<'a>,
    config: DisplayConfig,
    brightness: f32,
    auto_brightness: bool,
}

impl<'a, BUS, DELAY> Display<'a, BUS, DELAY, NoBacklight>
where
    BUS: BusSink,
    DELAY: DelayNs,
{
    /// Create a display without an adjustable backlight. No bus traffic happens until `init`.
    pub fn new(bus: BUS, sequence: InitSequence<'a>, config: DisplayConfig, delay: DELAY) -> Self {
        Self::build(bus, sequence, config, delay, None)
    }
}

impl<'a, BUS, DELAY, BL> Display<'a, BUS, DELAY, BL>
where
    BUS: BusSink,
    DELAY: DelayNs,
    BL: OutputPin,
{
    /// Create a display whose backlight is switched by `backlight`. No bus traffic happens
    /// until `init`.
    pub fn new_with_backlight(
        bus: BUS,
        sequence: InitSequence<'a>,
        config: DisplayConfig,
        delay: DELAY,
        backlight: BL,
    ) -> Self {
        Self::build(bus, sequence, config, delay, Some(backlight))
    }

    fn build(
        bus: BUS,
        sequence: InitSequence<'a>,
        config: DisplayConfig,
        delay: DELAY,
        backlight: Option<BL>,
    ) -> Self {
        Self {
            bus,
            delay,
            backlight,
            sequence,
            config,
            brightness: 1.0,
            auto_brightness: false,
        }
    }

    /// Send the full init sequence, then apply the current brightness to the backlight.
    /// Call again after the bus has been reset; the whole sequence is replayed each time.
    pub fn init(&mut self) -> Result<&mut Self, DisplayError<BUS::Error>> {
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Initializing {}x{} display, rotation {}",
            self.config.width(),
            self.config.height(),
            self.config.rotation()
        );
        replay(&self.sequence, &mut self.bus, &mut self.delay)?;
        let brightness = self.brightness;
        if let Some(backlight) = self.backlight.as_mut() {
            Self::drive_backlight(backlight, brightness)?;
        }
        Ok(self)
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn sequence(&self) -> &InitSequence<'a> {
        &self.sequence
    }

    /// Logical width after rotation
    pub fn width(&self) -> u16 {
        self.config.width()
    }

    /// Logical height after rotation
    pub fn height(&self) -> u16 {
        self.config.height()
    }

    pub fn rotation(&self) -> Rotation {
        self.config.rotation()
    }

    /// The bus, for streaming pixel data after `begin_ram_write`.
    pub fn bus_mut(&mut self) -> &mut BUS {
        &mut self.bus
    }

    /// Set the controller's update region to the inclusive rectangle `(x0, y0)`..`(x1, y1)`
    /// in logical coordinates.
    pub fn set_address_window(
        &mut self,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
    ) -> Result<&mut Self, DisplayError<BUS::Error>> {
        if x0 > x1 || x1 >= self.config.width() {
            return Err(DisplayError::ColumnOutOfRange);
        }
        if y0 > y1 || y1 >= self.config.height() {
            return Err(DisplayError::RowOutOfRange);
        }
        let colstart = self.config.colstart();
        let rowstart = self.config.rowstart();
        let columns = Self::address_range(x0, x1, colstart).ok_or(DisplayError::ColumnOutOfRange)?;
        let rows = Self::address_range(y0, y1, rowstart).ok_or(DisplayError::RowOutOfRange)?;

        self.bus
            .send_command(self.config.set_column_command, &columns)
            .map_err(DisplayError::BusWrite)?;
        self.bus
            .send_command(self.config.set_row_command, &rows)
            .map_err(DisplayError::BusWrite)?;
        Ok(self)
    }

    /// Start a RAM write into the current address window. Pixel data follows on the bus.
    pub fn begin_ram_write(&mut self) -> Result<&mut Self, DisplayError<BUS::Error>> {
        self.bus
            .send_command(self.config.write_ram_command, &[])
            .map_err(DisplayError::BusWrite)?;
        Ok(self)
    }

    /// Make `row` (native orientation) the first row shown.
    pub fn set_vertical_scroll(&mut self, row: u16) -> Result<&mut Self, DisplayError<BUS::Error>> {
        if self.config.set_vertical_scroll == 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("Vertical scroll not supported");
            return Err(DisplayError::UnsupportedOperation);
        }
        if row >= self.config.height {
            return Err(DisplayError::RowOutOfRange);
        }
        self.bus
            .send_command(self.config.set_vertical_scroll, &row.to_be_bytes())
            .map_err(DisplayError::BusWrite)?;
        Ok(self)
    }

    /// Current brightness, 0.0 (off) to 1.0 (full). Until `init` has driven the backlight
    /// this is the level `init` will apply. A failed pin write leaves it unchanged.
    pub fn brightness(&self) -> Result<f32, DisplayError<BUS::Error>> {
        if self.backlight.is_none() {
            return Err(DisplayError::BrightnessNotAdjustable);
        }
        Ok(self.brightness)
    }

    /// Set the brightness, clamped to 0.0..=1.0. An on/off backlight pin is driven high for
    /// any value above zero. Has no effect while `auto_brightness` is enabled.
    pub fn set_brightness(
        &mut self,
        brightness: f32,
    ) -> Result<&mut Self, DisplayError<BUS::Error>> {
        let Some(backlight) = self.backlight.as_mut() else {
            #[cfg(feature = "defmt")]
            defmt::warn!("Brightness not adjustable");
            return Err(DisplayError::BrightnessNotAdjustable);
        };
        if self.auto_brightness {
            #[cfg(feature = "defmt")]
            defmt::debug!("Ignoring brightness change while auto brightness is on");
            return Ok(self);
        }
        self.brightness = Self::drive_backlight(backlight, brightness.clamp(0.0, 1.0))?;
        Ok(self)
    }

    pub fn auto_brightness(&self) -> bool {
        self.auto_brightness
    }

    pub fn set_auto_brightness(&mut self, auto_brightness: bool) -> &mut Self {
        self.auto_brightness = auto_brightness;
        self
    }

    /// Consume the display and hand back its hardware.
    pub fn release(self) -> (BUS, DELAY, Option<BL>) {
        #[cfg(feature = "defmt")]
        defmt::debug!("Releasing display");
        (self.bus, self.delay, self.backlight)
    }

    /// Returns the brightness the pin reflects once the write succeeded.
    fn drive_backlight(
        backlight: &mut BL,
        brightness: f32,
    ) -> Result<f32, DisplayError<BUS::Error>> {
        if brightness > 0.0 {
            backlight
                .set_high()
                .map_err(|_| DisplayError::BacklightPinError)?;
            Ok(1.0)
        } else {
            backlight
                .set_low()
                .map_err(|_| DisplayError::BacklightPinError)?;
            Ok(0.0)
        }
    }

    /// Big-endian start/end pair for a column or row address command.
    fn address_range(start: u16, end: u16, offset: u16) -> Option<[u8; 4]> {
        let [start_hi, start_lo] = start.checked_add(offset)?.to_be_bytes();
        let [end_hi, end_lo] = end.checked_add(offset)?.to_be_bytes();
        Some([start_hi, start_lo, end_hi, end_lo])
    }
}
