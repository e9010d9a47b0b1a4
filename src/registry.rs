use heapless::Vec;

/// Number of displays a `Displays` collection holds unless a different limit is chosen.
pub const DEFAULT_DISPLAY_LIMIT: usize = 1;

/// The live displays of a system. Displays stay registered, and keep their buses and pins,
/// until `release_displays` hands them back.
pub struct Displays<D, const N: usize = DEFAULT_DISPLAY_LIMIT> {
    displays: Vec<D, N>,
}

impl<D, const N: usize> Default for Displays<D, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, const N: usize> Displays<D, N> {
    pub const fn new() -> Self {
        Self {
            displays: Vec::new(),
        }
    }

    /// Take ownership of `display` and return its index. When all `N` slots are taken the
    /// display is handed back in `Err`.
    pub fn register(&mut self, display: D) -> Result<usize, D> {
        let index = self.displays.len();
        match self.displays.push(display) {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Registered display {} of {}", index, N);
                Ok(index)
            }
            Err(display) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Too many displays");
                Err(display)
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&D> {
        self.displays.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut D> {
        self.displays.get_mut(index)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, D> {
        self.displays.iter()
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, D> {
        self.displays.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Unregister every display, yielding them in registration order.
    pub fn release_displays(&mut self) -> impl Iterator<Item = D> {
        #[cfg(feature = "defmt")]
        defmt::debug!("Releasing {} displays", self.displays.len());
        core::mem::take(&mut self.displays).into_iter()
    }
}
