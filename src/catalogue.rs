/*
Copyright 2024 CNR-ISAC

This file is part of osprey.

osprey is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

osprey is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with osprey. If not, see https://www.gnu.org/licenses/.
*/

//! Module with the static catalogue of NEMO variables.
//!
//! Each entry describes one variable of the ocean output: its
//! dimensionality, the staggered grid it lives on, its units and long
//! name. Derived quantities additionally carry a recipe: the list of
//! variables they depend on and a pure function combining them once
//! all dependencies are regridded to T points.

use crate::errors::DiagnosticError;
use crate::Float;
use ndarray::ArrayD;
use rustc_hash::FxHashMap;
use std::fmt;

/// Dimensionality of a catalogue variable: a horizontal field or a
/// full-depth field.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Dimensionality {
    TwoD,
    ThreeD,
}

impl Dimensionality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimensionality::TwoD => "2D",
            Dimensionality::ThreeD => "3D",
        }
    }
}

impl fmt::Display for Dimensionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staggered grid of the NEMO C-grid a variable is stored on.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NemoGrid {
    T,
    U,
    V,
    W,
}

impl NemoGrid {
    /// Upper-case letter used in file names and grid-suffixed
    /// dimension names.
    pub fn letter(&self) -> &'static str {
        match self {
            NemoGrid::T => "T",
            NemoGrid::U => "U",
            NemoGrid::V => "V",
            NemoGrid::W => "W",
        }
    }

    /// Name of the depth coordinate on this grid.
    pub fn depth_name(&self) -> &'static str {
        match self {
            NemoGrid::T => "deptht",
            NemoGrid::U => "depthu",
            NemoGrid::V => "depthv",
            NemoGrid::W => "depthw",
        }
    }
}

/// Recipe of a derived quantity: declared dependencies and a pure
/// combine function applied after every dependency is regridded to
/// T points. Dependencies are resolved by explicit catalogue lookup.
#[derive(Copy, Clone)]
pub struct Recipe {
    pub dependencies: &'static [&'static str],
    pub combine: fn(&[ArrayD<Float>]) -> ArrayD<Float>,
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Immutable description of one catalogue variable.
#[derive(Clone, Debug)]
pub struct VarDescriptor {
    pub dim: Dimensionality,
    pub grid: NemoGrid,
    pub units: &'static str,
    pub long_name: &'static str,
    pub recipe: Option<Recipe>,
}

impl VarDescriptor {
    fn plain(
        dim: Dimensionality,
        grid: NemoGrid,
        units: &'static str,
        long_name: &'static str,
    ) -> Self {
        VarDescriptor {
            dim,
            grid,
            units,
            long_name,
            recipe: None,
        }
    }
}

fn kinetic_energy(parts: &[ArrayD<Float>]) -> ArrayD<Float> {
    let mut sum = &parts[0] * &parts[0];
    for part in &parts[1..] {
        sum = sum + part * part;
    }
    sum * 0.5
}

fn product(parts: &[ArrayD<Float>]) -> ArrayD<Float> {
    &parts[0] * &parts[1]
}

/// Builds the catalogue of NEMO ocean variables.
pub fn catalogue() -> FxHashMap<&'static str, VarDescriptor> {
    use Dimensionality::{ThreeD, TwoD};
    use NemoGrid::{T, U, V, W};

    let mut vars: FxHashMap<&'static str, VarDescriptor> = FxHashMap::default();

    // T grid
    vars.insert("e3t", VarDescriptor::plain(ThreeD, T, "m", "T-cell thickness"));
    vars.insert("thetao", VarDescriptor::plain(ThreeD, T, "degC", "Temperature"));
    vars.insert("so", VarDescriptor::plain(ThreeD, T, "PSU", "Salinity"));
    vars.insert("tos", VarDescriptor::plain(TwoD, T, "degC", "Sea-surface temperature"));
    vars.insert("sos", VarDescriptor::plain(TwoD, T, "PSU", "Sea-surface salinity"));
    vars.insert("zos", VarDescriptor::plain(TwoD, T, "m", "Sea surface height"));
    vars.insert("sstdcy", VarDescriptor::plain(TwoD, T, "degC", "Sea-surface temperature diurnal cycle"));
    vars.insert("mldkz5", VarDescriptor::plain(TwoD, T, "m", "Turbocline depth"));
    vars.insert("mldr10_1", VarDescriptor::plain(TwoD, T, "m", "Mixed layer depth"));
    vars.insert("mldr10_1dcy", VarDescriptor::plain(TwoD, T, "m", "Amplitude of mldr10_1 diurnal cycle"));
    vars.insert("sbt", VarDescriptor::plain(TwoD, T, "degC", "Sea bottom temperature"));
    vars.insert("heatc", VarDescriptor::plain(TwoD, T, "J/m^2", "Heat content vertically integrated"));
    vars.insert("saltc", VarDescriptor::plain(TwoD, T, "PSU*kg/m^2", "Salt content vertically integrated"));
    vars.insert("wfo", VarDescriptor::plain(TwoD, T, "kg/m^2/s", "Net upward water flux"));
    vars.insert("qsr_oce", VarDescriptor::plain(TwoD, T, "W/m^2", "Solar heat flux at ocean surface"));
    vars.insert("qns_oce", VarDescriptor::plain(TwoD, T, "W/m^2", "Non-solar heat flux at ocean surface"));
    vars.insert("qt_oce", VarDescriptor::plain(TwoD, T, "W/m^2", "Total flux at ocean surface"));
    vars.insert("sfx", VarDescriptor::plain(TwoD, T, "g/m2/s", "Downward salt flux"));
    vars.insert("taum", VarDescriptor::plain(TwoD, T, "N/m^2", "Surface downward wind stress"));
    vars.insert("windsp", VarDescriptor::plain(TwoD, T, "m/s", "Wind speed"));
    vars.insert("precip", VarDescriptor::plain(TwoD, T, "kg/m2/s", "Precipitation flux"));
    vars.insert("snowpre", VarDescriptor::plain(TwoD, T, "kg/m2/s", "Snowfall flux"));

    // U grid
    vars.insert("e3u", VarDescriptor::plain(ThreeD, U, "m", "U-cell thickness"));
    vars.insert("uo", VarDescriptor::plain(ThreeD, U, "m/s", "Ocean current along i-axis"));
    vars.insert("uos", VarDescriptor::plain(TwoD, U, "m/s", "Ocean surface current along i-axis"));
    vars.insert("tauuo", VarDescriptor::plain(TwoD, U, "N/m^2", "Wind stress along i-axis"));
    vars.insert("uocetr_eff", VarDescriptor::plain(ThreeD, U, "m^3/s", "Effective ocean transport along i-axis"));
    vars.insert("vozomatr", VarDescriptor::plain(ThreeD, U, "kg/s", "Ocean mass transport along i-axis"));
    vars.insert("sozohetr", VarDescriptor::plain(TwoD, U, "W", "Heat transport along i-axis"));
    vars.insert("sozosatr", VarDescriptor::plain(TwoD, U, "1e-3*kg/s", "Salt transport along i-axis"));

    // V grid
    vars.insert("e3v", VarDescriptor::plain(ThreeD, V, "m", "V-cell thickness"));
    vars.insert("vo", VarDescriptor::plain(ThreeD, V, "m/s", "Ocean current along j-axis"));
    vars.insert("vos", VarDescriptor::plain(TwoD, V, "m/s", "Ocean surface current along j-axis"));
    vars.insert("tauvo", VarDescriptor::plain(TwoD, V, "N/m^2", "Wind stress along j-axis"));
    vars.insert("vocetr_eff", VarDescriptor::plain(ThreeD, V, "m^3/s", "Effective ocean transport along j-axis"));
    vars.insert("vomematr", VarDescriptor::plain(ThreeD, V, "kg/s", "Ocean mass transport along j-axis"));
    vars.insert("somehetr", VarDescriptor::plain(TwoD, V, "W", "Heat transport along j-axis"));
    vars.insert("somesatr", VarDescriptor::plain(TwoD, V, "1e-3*kg/s", "Salt transport along j-axis"));

    // W grid
    vars.insert("e3w", VarDescriptor::plain(ThreeD, W, "m", "W-cell thickness"));
    vars.insert("wo", VarDescriptor::plain(ThreeD, W, "m/s", "Ocean vertical velocity"));
    vars.insert("difvho", VarDescriptor::plain(ThreeD, W, "m^2/s", "Vertical eddy diffusivity"));
    vars.insert("vovematr", VarDescriptor::plain(ThreeD, W, "kg/s", "Vertical mass transport"));
    vars.insert("av_wave", VarDescriptor::plain(ThreeD, W, "m^2/s", "Internal wave-induced vertical diffusivity"));
    vars.insert("bn2", VarDescriptor::plain(ThreeD, W, "1/s^2", "Squared Brunt-Vaisala frequency"));
    vars.insert("bflx_iwm", VarDescriptor::plain(ThreeD, W, "W/kg", "Internal wave-induced buoyancy flux"));
    vars.insert("pcmap_iwm", VarDescriptor::plain(TwoD, W, "W/m^2", "Power consumption by wave-driven mixing"));
    vars.insert("emix_iwm", VarDescriptor::plain(ThreeD, W, "W/kg", "Power density available for mixing"));
    vars.insert("av_ratio", VarDescriptor::plain(ThreeD, W, "-", "S over T diffusivity ratio"));

    // derived quantities; all dependencies get regridded to T points
    // before the combine function runs
    vars.insert(
        "keos",
        VarDescriptor {
            dim: TwoD,
            grid: T,
            units: "m^2/s^2",
            long_name: "Surface Kinetic Energy",
            recipe: Some(Recipe {
                dependencies: &["uos", "vos"],
                combine: kinetic_energy,
            }),
        },
    );
    vars.insert(
        "keoh",
        VarDescriptor {
            dim: ThreeD,
            grid: T,
            units: "m^2/s^2",
            long_name: "Horizontal Kinetic Energy",
            recipe: Some(Recipe {
                dependencies: &["uo", "vo"],
                combine: kinetic_energy,
            }),
        },
    );
    vars.insert(
        "keo",
        VarDescriptor {
            dim: ThreeD,
            grid: T,
            units: "m^2/s^2",
            long_name: "Total Kinetic Energy",
            recipe: Some(Recipe {
                dependencies: &["uo", "vo", "wo"],
                combine: kinetic_energy,
            }),
        },
    );
    vars.insert(
        "woto",
        VarDescriptor {
            dim: ThreeD,
            grid: T,
            units: "K*m/s",
            long_name: "Buoyancy flux",
            recipe: Some(Recipe {
                dependencies: &["thetao", "wo"],
                combine: product,
            }),
        },
    );

    vars
}

/// Catalogue lookup, turning an unknown name into the fatal
/// invalid-parameter error of the taxonomy.
pub fn lookup<'a>(
    vars: &'a FxHashMap<&'static str, VarDescriptor>,
    varname: &str,
) -> Result<&'a VarDescriptor, DiagnosticError> {
    vars.get(varname)
        .ok_or_else(|| DiagnosticError::UnknownVariable(varname.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn plain_entry() {
        let vars = catalogue();
        let desc = lookup(&vars, "thetao").unwrap();

        assert_eq!(desc.dim, Dimensionality::ThreeD);
        assert_eq!(desc.grid, NemoGrid::T);
        assert_eq!(desc.units, "degC");
        assert!(desc.recipe.is_none());
    }

    #[test]
    fn unknown_variable_is_fatal() {
        let vars = catalogue();
        assert!(lookup(&vars, "no_such_var").is_err());
    }

    #[test]
    fn kinetic_energy_recipe() {
        let vars = catalogue();
        let desc = lookup(&vars, "keos").unwrap();
        let recipe = desc.recipe.as_ref().unwrap();

        assert_eq!(recipe.dependencies, &["uos", "vos"]);

        let u = arr1(&[3.0, 0.0]).into_dyn();
        let v = arr1(&[4.0, 2.0]).into_dyn();
        let ke = (recipe.combine)(&[u, v]);

        assert_eq!(ke[[0]], 12.5);
        assert_eq!(ke[[1]], 2.0);
    }
}
