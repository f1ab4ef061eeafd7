//! OpenROAD plugin for the flow engine.

use flow::{Registry, RegistryBuilder, Result, Step};
use lazy_static::lazy_static;
use tera::Tera;

pub mod irdrop;
pub mod rcx;
pub mod script;
pub mod sdc;
pub mod sta;
pub mod step;
pub mod vars;

#[cfg(test)]
mod tests;

pub use irdrop::IrDropReport;
pub use rcx::Rcx;
pub use sdc::CheckSdcFiles;
pub use sta::{StaPostPnr, StaPrePnr};
pub use step::{Kind, OpenRoadStep};

pub const TEMPLATES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        match Tera::new(&format!("{TEMPLATES_PATH}/*")) {
            Ok(t) => t,
            Err(e) => {
                panic!("Encountered errors while parsing Tera templates: {e}");
            }
        }
    };
}

macro_rules! script_steps {
    ($builder:expr, $($kind:ident),* $(,)?) => {
        $(
            $builder.register_step(|| -> Box<dyn Step> {
                Box::new(OpenRoadStep::new(Kind::$kind))
            })?;
        )*
    };
}

/// Registers every OpenROAD step.
pub fn register(builder: &mut RegistryBuilder) -> Result<()> {
    builder.register_step(|| -> Box<dyn Step> { Box::new(CheckSdcFiles::new()) })?;
    builder.register_step(|| -> Box<dyn Step> { Box::new(StaPrePnr::new()) })?;
    builder.register_step(|| -> Box<dyn Step> { Box::new(StaPostPnr::new()) })?;
    script_steps!(
        builder,
        StaMidPnr,
        Floorplan,
        IoPlacement,
        TapEndcapInsertion,
        GeneratePdn,
        GlobalPlacement,
        GlobalPlacementSkipIo,
        DetailedPlacement,
        CheckAntennas,
        GlobalRouting,
        RepairAntennas,
        DetailedRouting,
        LayoutSta,
        FillInsertion,
    );
    builder.register_step(|| -> Box<dyn Step> { Box::new(Rcx::new()) })?;
    builder.register_step(|| -> Box<dyn Step> { Box::new(IrDropReport::new()) })?;
    script_steps!(
        builder,
        WriteViews,
        Cts,
        RepairDesignPostGpl,
        RepairDesign,
        RepairDesignPostGrt,
        ResizerTimingPostCts,
        ResizerTimingPostGrt,
    );
    Ok(())
}

/// A registry holding every OpenROAD step.
pub fn registry() -> Result<Registry> {
    let mut builder = RegistryBuilder::new();
    register(&mut builder)?;
    Ok(builder.build())
}
