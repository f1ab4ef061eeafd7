//! Steps that run a single OpenROAD script on the design database.

use std::fs;
use std::path::Path;

use config::{Config, Variable};
use flow::report::antenna_nets;
use flow::{Delta, DesignView, Error, PipelineState, Result, Step, StepContext};
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::script::{
    Program, ScriptRun, aggregate_timing, base_env, collect_outputs, corner_libs, join_paths,
    script_path,
};
use crate::vars::{self, openroad_variables};

/// The metric counting nets at risk of antenna violations.
pub const ANTENNA_VIOLATIONS: &str = "route__antenna_violations__count";

const ODB: &[DesignView] = &[DesignView::Odb];
const NETLIST: &[DesignView] = &[DesignView::Netlist];
const NONE: &[DesignView] = &[];
const LAYOUT: &[DesignView] = &[
    DesignView::Odb,
    DesignView::Def,
    DesignView::Sdc,
    DesignView::Netlist,
    DesignView::PoweredNetlist,
];
const ROUTED: &[DesignView] = &[DesignView::Odb, DesignView::Def];
const ALL_VIEWS: &[DesignView] = &[
    DesignView::Odb,
    DesignView::Def,
    DesignView::Sdc,
    DesignView::Netlist,
    DesignView::PoweredNetlist,
    DesignView::PoweredNetlistSdfFriendly,
    DesignView::PoweredNetlistNoPhysicalCells,
    DesignView::OpenroadLef,
];

/// The script-driven OpenROAD steps.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Kind {
    /// Floorplan initialization from the synthesized netlist.
    Floorplan,
    /// I/O pin placement.
    IoPlacement,
    /// Well tap and end-cap insertion.
    TapEndcapInsertion,
    /// Power distribution network generation.
    GeneratePdn,
    /// Global placement.
    GlobalPlacement,
    /// Global placement that leaves I/O pins in place.
    GlobalPlacementSkipIo,
    /// Detailed placement.
    DetailedPlacement,
    /// Clock tree synthesis.
    Cts,
    /// Design repair after global placement.
    RepairDesignPostGpl,
    /// Design repair after global placement, under its legacy id.
    RepairDesign,
    /// Design repair after global routing.
    RepairDesignPostGrt,
    /// Timing repair after clock tree synthesis.
    ResizerTimingPostCts,
    /// Timing repair after global routing.
    ResizerTimingPostGrt,
    /// Antenna check.
    CheckAntennas,
    /// Global routing.
    GlobalRouting,
    /// Antenna repair.
    RepairAntennas,
    /// Detailed routing.
    DetailedRouting,
    /// STA on the layout.
    LayoutSta,
    /// STA on the layout using the corner script.
    StaMidPnr,
    /// Filler and decap insertion.
    FillInsertion,
    /// Writes every netlist and abstract view of the layout.
    WriteViews,
}

impl Kind {
    /// Every kind, in flow order.
    pub const ALL: [Kind; 21] = [
        Kind::Floorplan,
        Kind::IoPlacement,
        Kind::TapEndcapInsertion,
        Kind::GeneratePdn,
        Kind::GlobalPlacement,
        Kind::GlobalPlacementSkipIo,
        Kind::DetailedPlacement,
        Kind::Cts,
        Kind::RepairDesignPostGpl,
        Kind::RepairDesign,
        Kind::RepairDesignPostGrt,
        Kind::ResizerTimingPostCts,
        Kind::ResizerTimingPostGrt,
        Kind::CheckAntennas,
        Kind::GlobalRouting,
        Kind::RepairAntennas,
        Kind::DetailedRouting,
        Kind::LayoutSta,
        Kind::StaMidPnr,
        Kind::FillInsertion,
        Kind::WriteViews,
    ];

    /// The registry id.
    pub const fn id(&self) -> &'static str {
        match self {
            Kind::Floorplan => "OpenROAD.Floorplan",
            Kind::IoPlacement => "OpenROAD.IOPlacement",
            Kind::TapEndcapInsertion => "OpenROAD.TapEndcapInsertion",
            Kind::GeneratePdn => "OpenROAD.GeneratePDN",
            Kind::GlobalPlacement => "OpenROAD.GlobalPlacement",
            Kind::GlobalPlacementSkipIo => "OpenROAD.GlobalPlacementSkipIO",
            Kind::DetailedPlacement => "OpenROAD.DetailedPlacement",
            Kind::Cts => "OpenROAD.CTS",
            Kind::RepairDesignPostGpl => "OpenROAD.RepairDesignPostGPL",
            Kind::RepairDesign => "OpenROAD.RepairDesign",
            Kind::RepairDesignPostGrt => "OpenROAD.RepairDesignPostGRT",
            Kind::ResizerTimingPostCts => "OpenROAD.ResizerTimingPostCTS",
            Kind::ResizerTimingPostGrt => "OpenROAD.ResizerTimingPostGRT",
            Kind::CheckAntennas => "OpenROAD.CheckAntennas",
            Kind::GlobalRouting => "OpenROAD.GlobalRouting",
            Kind::RepairAntennas => "OpenROAD.RepairAntennas",
            Kind::DetailedRouting => "OpenROAD.DetailedRouting",
            Kind::LayoutSta => "OpenROAD.LayoutSTA",
            Kind::StaMidPnr => "OpenROAD.STAMidPNR",
            Kind::FillInsertion => "OpenROAD.FillInsertion",
            Kind::WriteViews => "OpenROAD.WriteViews",
        }
    }

    /// The human-readable name.
    pub const fn name(&self) -> &'static str {
        match self {
            Kind::Floorplan => "Floorplan Init",
            Kind::IoPlacement => "I/O Placement",
            Kind::TapEndcapInsertion => "Tap/Decap Insertion",
            Kind::GeneratePdn => "Generate PDN",
            Kind::GlobalPlacement => "Global Placement",
            Kind::GlobalPlacementSkipIo => "Global Placement Skip IO",
            Kind::DetailedPlacement => "Detailed Placement",
            Kind::Cts => "Clock Tree Synthesis",
            Kind::RepairDesignPostGpl | Kind::RepairDesign => {
                "Repair Design (Post-Global Placement)"
            }
            Kind::RepairDesignPostGrt => "Repair Design (Post-Global Routing)",
            Kind::ResizerTimingPostCts => {
                "Resizer Timing Optimizations (Post-Clock Tree Synthesis)"
            }
            Kind::ResizerTimingPostGrt => "Resizer Timing Optimizations (Post-Global Routing)",
            Kind::CheckAntennas => "Check Antennas",
            Kind::GlobalRouting => "Global Routing",
            Kind::RepairAntennas => "Antenna Repair",
            Kind::DetailedRouting => "Detailed Routing",
            Kind::LayoutSta => "Layout STA",
            Kind::StaMidPnr => "STA (Mid-PnR)",
            Kind::FillInsertion => "Fill Insertion",
            Kind::WriteViews => "OpenROAD Write Views",
        }
    }

    /// The script, relative to the OpenROAD scripts directory.
    pub const fn script(&self) -> &'static str {
        match self {
            Kind::Floorplan => "floorplan.tcl",
            Kind::IoPlacement => "ioplacer.tcl",
            Kind::TapEndcapInsertion => "tapcell.tcl",
            Kind::GeneratePdn => "pdn.tcl",
            Kind::GlobalPlacement | Kind::GlobalPlacementSkipIo => "gpl.tcl",
            Kind::DetailedPlacement => "dpl.tcl",
            Kind::Cts => "cts.tcl",
            Kind::RepairDesignPostGpl | Kind::RepairDesign => "repair_design.tcl",
            Kind::RepairDesignPostGrt => "repair_design_postgrt.tcl",
            Kind::ResizerTimingPostCts => "rsz_timing_postcts.tcl",
            Kind::ResizerTimingPostGrt => "rsz_timing_postgrt.tcl",
            Kind::CheckAntennas => "antenna_check.tcl",
            Kind::GlobalRouting => "grt.tcl",
            Kind::RepairAntennas => "antenna_repair.tcl",
            Kind::DetailedRouting => "drt.tcl",
            Kind::LayoutSta => "sta.tcl",
            Kind::StaMidPnr => "sta/corner.tcl",
            Kind::FillInsertion => "fill.tcl",
            Kind::WriteViews => "write_views.tcl",
        }
    }

    /// Views that must be present before the step runs.
    pub const fn inputs(&self) -> &'static [DesignView] {
        match self {
            Kind::Floorplan => NETLIST,
            _ => ODB,
        }
    }

    /// Views the step may produce.
    pub const fn outputs(&self) -> &'static [DesignView] {
        match self {
            Kind::CheckAntennas | Kind::LayoutSta | Kind::StaMidPnr => NONE,
            Kind::GlobalRouting | Kind::RepairAntennas => ROUTED,
            Kind::WriteViews => ALL_VIEWS,
            _ => LAYOUT,
        }
    }

    /// The configuration key naming the resizer's corners, for resizer steps.
    pub const fn resizer_corners(&self) -> Option<&'static str> {
        match self {
            Kind::Cts => Some("CTS_CORNERS"),
            Kind::RepairDesignPostGpl
            | Kind::RepairDesign
            | Kind::RepairDesignPostGrt
            | Kind::ResizerTimingPostCts
            | Kind::ResizerTimingPostGrt => Some("RSZ_CORNERS"),
            _ => None,
        }
    }

    /// Returns `true` if the step leaves an antenna report behind.
    pub const fn checks_antennas(&self) -> bool {
        matches!(
            self,
            Kind::CheckAntennas | Kind::GlobalRouting | Kind::RepairAntennas
        )
    }

    fn variables(&self) -> Vec<Variable> {
        let resizer = || {
            let mut vars = vars::grt_variables();
            vars.extend(vars::rsz_variables());
            vars
        };
        let mut vars = openroad_variables();
        vars.extend(match self {
            Kind::Floorplan => vars::floorplan_variables(),
            Kind::IoPlacement => vars::io_placement_variables(),
            Kind::TapEndcapInsertion => vars::tap_variables(),
            Kind::GeneratePdn => vars::generate_pdn_variables(),
            Kind::GlobalPlacement => vars::global_placement_variables(),
            Kind::GlobalPlacementSkipIo => {
                let mut vars = vars::global_placement_variables();
                vars.push(vars::fp_io_mode());
                vars
            }
            Kind::DetailedPlacement => vars::dpl_variables(),
            Kind::Cts => {
                let mut vars = vars::dpl_variables();
                vars.extend(vars::cts_variables());
                vars
            }
            Kind::RepairDesignPostGpl | Kind::RepairDesign => {
                let mut vars = resizer();
                vars.extend(vars::repair_design_variables());
                vars
            }
            Kind::RepairDesignPostGrt => {
                let mut vars = resizer();
                vars.extend(vars::repair_design_post_grt_variables());
                vars
            }
            Kind::ResizerTimingPostCts => {
                let mut vars = resizer();
                vars.extend(vars::timing_post_cts_variables());
                vars
            }
            Kind::ResizerTimingPostGrt => {
                let mut vars = resizer();
                vars.extend(vars::timing_post_grt_variables());
                vars
            }
            Kind::GlobalRouting | Kind::RepairAntennas => {
                let mut vars = vars::grt_variables();
                vars.extend(vars::dpl_variables());
                vars
            }
            Kind::DetailedRouting => vars::detailed_routing_variables(),
            Kind::CheckAntennas
            | Kind::LayoutSta
            | Kind::StaMidPnr
            | Kind::FillInsertion
            | Kind::WriteViews => Vec::new(),
        });
        vars
    }
}

/// A step that runs one OpenROAD script.
#[derive(Clone, Debug)]
pub struct OpenRoadStep {
    kind: Kind,
    vars: Vec<Variable>,
}

impl OpenRoadStep {
    /// Creates the step of the given kind.
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            vars: kind.variables(),
        }
    }

    /// The kind of step.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    fn extra_env(&self, ctx: &StepContext, env: &mut IndexMap<String, String>) -> Result<()> {
        let config = &ctx.config;
        match self.kind {
            Kind::Floorplan => {
                let tracks = write_tracks(config, &ctx.step_dir)?;
                env.insert("TRACKS_INFO_FILE_PROCESSED".into(), tracks);
            }
            Kind::GeneratePdn if !config.is_set("FP_PDN_CFG") => {
                let cfg = script_path(config, "common/pdn_cfg.tcl")?;
                tracing::info!(
                    "FP_PDN_CFG not explicitly set, setting it to {}",
                    cfg.display()
                );
                env.insert("FP_PDN_CFG".into(), cfg.display().to_string());
            }
            Kind::GlobalPlacement | Kind::GlobalPlacementSkipIo => {
                if let Some(density) = target_density(config)? {
                    tracing::warn!(
                        "PL_TARGET_DENSITY_PCT not explicitly set, using dynamically calculated target density: {density}"
                    );
                    env.insert("PL_TARGET_DENSITY_PCT".into(), density.to_string());
                }
                if self.kind == Kind::GlobalPlacementSkipIo {
                    env.insert("__PL_SKIP_IO".into(), "1".into());
                }
            }
            Kind::DetailedRouting => {
                if !config.is_set("DRT_THREADS") {
                    let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
                    env.insert("DRT_THREADS".into(), threads.to_string());
                }
                if let Some(threads) = env.get("DRT_THREADS") {
                    tracing::info!("running TritonRoute with {threads} threads");
                }
            }
            Kind::LayoutSta => {
                env.insert("RUN_STANDALONE".into(), "1".into());
            }
            _ => {}
        }

        if self.kind == Kind::Cts && !config.is_set("CLOCK_NET") {
            let ports = config.opt_str_list("CLOCK_PORT")?;
            env.insert("CLOCK_NET".into(), ports.join(" "));
        }
        if let Some(key) = self.kind.resizer_corners() {
            env.extend(resizer_corner_env(config, key)?);
        }
        Ok(())
    }
}

impl Step for OpenRoadStep {
    fn id(&self) -> &str {
        self.kind.id()
    }

    fn name(&self) -> &str {
        self.kind.name()
    }

    fn inputs(&self) -> &[DesignView] {
        self.kind.inputs()
    }

    fn outputs(&self) -> &[DesignView] {
        self.kind.outputs()
    }

    fn config_vars(&self) -> &[Variable] {
        &self.vars
    }

    fn precondition(&self, ctx: &StepContext, _state: &PipelineState) -> Result<Option<String>> {
        let config = &ctx.config;
        let reason = match self.kind {
            Kind::IoPlacement if config.is_set("FP_PIN_ORDER_CFG") => {
                Some("FP_PIN_ORDER_CFG is set".to_string())
            }
            Kind::GlobalPlacementSkipIo
                if config.str("FP_IO_MODE")? == "random_equidistant" =>
            {
                Some("FP_IO_MODE is random_equidistant".to_string())
            }
            Kind::Cts
                if !config.is_set("CLOCK_NET")
                    && config.opt_str_list("CLOCK_PORT")?.is_empty() =>
            {
                Some("no CLOCK_NET or CLOCK_PORT is specified".to_string())
            }
            _ => None,
        };
        Ok(reason)
    }

    fn run(&self, ctx: &StepContext, state: &PipelineState) -> Result<Delta> {
        let config = &ctx.config;
        let mut env = base_env(
            config,
            &self.vars,
            state,
            self.inputs(),
            self.outputs(),
            &ctx.step_dir,
        )?;
        self.extra_env(ctx, &mut env)?;

        let run = ScriptRun {
            program: Program::OpenRoad,
            script: script_path(config, self.kind.script())?,
            dir: ctx.step_dir.clone(),
            log: "openroad.log",
            env,
        };
        let metrics = run.execute(ctx.runner.as_ref())?;

        let mut delta = collect_outputs(&ctx.step_dir, config.str("DESIGN_NAME")?, self.outputs());
        delta.metrics = aggregate_timing(&metrics)?;
        if self.kind.checks_antennas() {
            let count = write_antenna_nets(&ctx.step_dir)?;
            delta.metrics.insert(ANTENNA_VIOLATIONS, count);
        }
        Ok(delta)
    }
}

/// Transpiles `FP_TRACKS_INFO` into `config.tracks` in `dir`.
fn write_tracks(config: &Config, dir: &Path) -> Result<String> {
    let legacy_path = config.path("FP_TRACKS_INFO")?;
    let legacy = fs::read_to_string(legacy_path)?;
    let tracks = tracks::transpile(&legacy).map_err(|e| Error::ReportFormat {
        path: legacy_path.to_path_buf(),
        message: e.to_string(),
    })?;
    let path = dir.join("config.tracks");
    fs::write(&path, tracks)?;
    Ok(path.display().to_string())
}

/// The placement density used when `PL_TARGET_DENSITY_PCT` is unset.
fn target_density(config: &Config) -> Result<Option<Decimal>> {
    if config.is_set("PL_TARGET_DENSITY_PCT") {
        return Ok(None);
    }
    let util = config.decimal("FP_CORE_UTIL")?;
    let padding = config.decimal("GPL_CELL_PADDING")?;
    let density = util + Decimal::from(5) * padding + Decimal::TEN;
    Ok(Some(density.min(Decimal::ONE_HUNDRED).normalize()))
}

/// Exports `RSZ_CORNER_<n>` for every corner with a library set not yet exported.
///
/// Corners come from `key`, falling back to `STA_CORNERS`.
pub fn resizer_corner_env(config: &Config, key: &str) -> Result<IndexMap<String, String>> {
    let mut corners = config.opt_str_list(key)?;
    if corners.is_empty() {
        corners = config.str_list("STA_CORNERS")?;
    }

    let mut seen = Vec::new();
    let mut env = IndexMap::new();
    for corner in corners {
        let libs = corner_libs(config, &corner);
        let mut lib_set = libs.clone();
        lib_set.sort();
        lib_set.dedup();
        if seen.contains(&lib_set) {
            tracing::debug!(corner, "libraries already exported, skipping");
            continue;
        }
        let value = format!("{corner} {}", join_paths(&libs));
        env.insert(format!("RSZ_CORNER_{}", seen.len()), value);
        seen.push(lib_set);
    }
    Ok(env)
}

/// Lists the nets of `antenna.rpt` in `antenna_net_list.txt`, returning their count.
fn write_antenna_nets(dir: &Path) -> Result<usize> {
    let report = fs::read_to_string(dir.join("antenna.rpt"))?;
    let nets = antenna_nets(&report);
    let mut list = nets.join("\n");
    if !list.is_empty() {
        list.push('\n');
    }
    fs::write(dir.join("antenna_net_list.txt"), list)?;
    Ok(nets.len())
}
