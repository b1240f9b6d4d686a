use crate::common::{InversionMethod, ProcessingConfig};

/// Counting-rate-law inversion from a corrected neutron count to a
/// volumetric moisture fraction. The theta engine and the N0 scan are
/// agnostic to which implementation is plugged in.
pub trait CountInversion: std::fmt::Debug {
    fn moisture(
        &self,
        bulk_density: f64,
        count: f64,
        n0: f64,
        lattice_water: f64,
        soc_water_equivalent: f64,
    ) -> f64;
}

/// Desilets et al. (2010) form `((a0/(N/N0 - a1)) - a2 - lw - soc) * bd`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesiletsInversion {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
}

impl CountInversion for DesiletsInversion {
    fn moisture(
        &self,
        bulk_density: f64,
        count: f64,
        n0: f64,
        lattice_water: f64,
        soc_water_equivalent: f64,
    ) -> f64 {
        (self.a0 / (count / n0 - self.a1) - self.a2 - lattice_water - soc_water_equivalent)
            * bulk_density
    }
}

/// Köhli-style reparameterisation of the same law around the theoretical
/// maximum count `nmax = N0 (a0 + a1 a2) / a2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KohliInversion {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
}

impl CountInversion for KohliInversion {
    fn moisture(
        &self,
        bulk_density: f64,
        count: f64,
        n0: f64,
        lattice_water: f64,
        soc_water_equivalent: f64,
    ) -> f64 {
        let nmax = n0 * (self.a0 + self.a1 * self.a2) / self.a2;
        let ah0 = -self.a2;
        let ah1 = self.a1 * self.a2 / (self.a0 + self.a1 * self.a2);
        (ah0 * (1.0 - count / nmax) / (ah1 - count / nmax)
            - lattice_water
            - soc_water_equivalent)
            * bulk_density
    }
}

/// Builds the configured inversion with the configured law constants.
pub fn inversion_for(config: &ProcessingConfig) -> Box<dyn CountInversion> {
    match config.inversion_method {
        InversionMethod::Standard => Box::new(DesiletsInversion {
            a0: config.a0,
            a1: config.a1,
            a2: config.a2,
        }),
        InversionMethod::Kohli => Box::new(KohliInversion {
            a0: config.a0,
            a1: config.a1,
            a2: config.a2,
        }),
    }
}
