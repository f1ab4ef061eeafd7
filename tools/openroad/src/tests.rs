use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

use config::{Config, RawConfig, Resolver, UnknownKeyPolicy, merge_variables};
use flow::vars::flow_variables;
use flow::{
    Delta, DesignView, Error, Invocation, MetricValue, PipelineState, Result, SequentialFlow,
    Step, StepContext, StepOutcome, ToolRunner, ViewValue, WorkerPool,
};
use rust_decimal_macros::dec;
use serde_json::{Value as Json, json};

use crate::script::{quote, write_run_script};
use crate::step::{ANTENNA_VIOLATIONS, resizer_corner_env};
use crate::*;

pub(crate) const TEST_BUILD_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/build");

const NOM: &str = "nom_tt_025C_1v80";
const MIN: &str = "min_ff_n40C_1v95";
const MAX: &str = "max_ss_100C_1v60";

fn build_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from(TEST_BUILD_PATH).join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Writes the PDK files of a test into `dir/pdk` and returns the PDK defaults.
fn pdk(dir: &Path) -> Json {
    let pdk = dir.join("pdk");
    fs::create_dir_all(&pdk).unwrap();
    let file = |name: &str, contents: &str| {
        let path = pdk.join(name);
        fs::write(&path, contents).unwrap();
        path.display().to_string()
    };
    json!({
        "STA_CORNERS": [NOM, MIN, MAX],
        "DEFAULT_CORNER": NOM,
        "LIB": {
            "nom_*": [file("nom.lib", "")],
            "min_*": [file("fast.lib", "")],
            "max_*": [file("fast.lib", "")],
        },
        "TECH_LEFS": {
            "nom_*": file("nom.tlef", ""),
            "min_*": file("min.tlef", ""),
        },
        "CELL_LEFS": [file("cells.lef", "")],
        "FP_TRACKS_INFO": file("tracks.info", "li1 X 0.23 0.46\nli1 Y 0.17 0.34\n"),
        "PNR_EXCLUSION_CELL_LIST": file("exclude.cells", "cell_a  cell_b\n\ncell_c\n"),
        "GPL_CELL_PADDING": 1,
        "FALLBACK_SDC_FILE": file("fallback.sdc", ""),
        "RCX_RULESETS": {
            "nom_*": file("nom.rules", ""),
            "min_*": file("min.rules", ""),
        },
    })
}

fn resolve(step: &dyn Step, dir: &Path, design: Json) -> Arc<Config> {
    let common = flow_variables();
    let vars = merge_variables([common.as_slice(), step.config_vars()]).unwrap();
    let mut raw = json!({ "DESIGN_NAME": "spm" });
    if let (Json::Object(raw), Json::Object(extra)) = (&mut raw, design) {
        raw.extend(extra);
    }
    let (config, _) = Resolver::new(&vars)
        .unknown_keys(UnknownKeyPolicy::Ignore)
        .resolve(
            &RawConfig::from_json(raw).unwrap(),
            &RawConfig::from_json(pdk(dir)).unwrap(),
        )
        .unwrap();
    Arc::new(config)
}

fn state(views: Vec<(DesignView, ViewValue)>) -> PipelineState {
    let mut delta = Delta::new();
    delta.views.extend(views);
    PipelineState::new().merge(&delta).unwrap()
}

fn spefs(entries: &[(&str, &str)]) -> ViewValue {
    ViewValue::PerCorner(
        entries
            .iter()
            .map(|(corner, path)| ((*corner).into(), PathBuf::from(path)))
            .collect(),
    )
}

type MetricsFn = fn(&Invocation) -> Json;

/// Stands in for OpenROAD: creates every `SAVE_*` file, the configured
/// files in the working directory and, optionally, a metrics file.
#[derive(Default)]
struct FakeRunner {
    invocations: Mutex<Vec<Invocation>>,
    files: Vec<(&'static str, &'static str)>,
    metrics: Option<MetricsFn>,
    fail: bool,
}

impl FakeRunner {
    fn with_files(files: &[(&'static str, &'static str)]) -> Self {
        Self {
            files: files.to_vec(),
            ..Default::default()
        }
    }

    fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    fn only_invocation(&self) -> Invocation {
        let invocations = self.invocations();
        assert_eq!(invocations.len(), 1);
        invocations.into_iter().next().unwrap()
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        self.invocations.lock().unwrap().push(invocation.clone());
        for (name, value) in &invocation.env {
            if name.starts_with("SAVE_") && name != "SAVE_METRICS" {
                fs::write(value, "")?;
            }
        }
        for (name, contents) in &self.files {
            fs::write(invocation.work_dir.join(name), contents)?;
        }
        if let Some(metrics) = self.metrics {
            let path = invocation
                .env
                .get("SAVE_METRICS")
                .cloned()
                .or_else(|| invocation.command.get(4).cloned())
                .unwrap();
            fs::write(path, metrics(invocation).to_string())?;
        }
        if self.fail {
            return Err(Error::ExternalTool {
                command: invocation.command_line(),
                status: ExitStatus::from_raw(256),
                log: invocation.log.clone(),
            });
        }
        Ok(())
    }
}

fn context(config: Arc<Config>, step_dir: PathBuf, runner: Arc<FakeRunner>) -> StepContext {
    fs::create_dir_all(&step_dir).unwrap();
    StepContext {
        config,
        step_dir,
        pool: Arc::new(WorkerPool::new(2)),
        runner,
    }
}

fn timing_metrics(invocation: &Invocation) -> Json {
    let corner = invocation.env["CURRENT_CORNER_NAME"].clone();
    let (ws, count) = match corner.as_str() {
        NOM => (json!(0.25), 0),
        MIN => (json!("Infinity"), 1),
        _ => (json!(-0.5), 2),
    };
    json!({
        format!("timing__setup__ws__corner:{corner}"): ws,
        format!("timing__setup_vio__count__corner:{corner}"): count,
    })
}

#[test]
fn registry_holds_every_step() {
    let registry = registry().unwrap();
    assert_eq!(registry.len(), 26);
    for id in [
        "OpenROAD.CheckSDCFiles",
        "OpenROAD.STAPrePNR",
        "OpenROAD.STAPostPNR",
        "OpenROAD.Floorplan",
        "OpenROAD.CTS",
        "OpenROAD.RCX",
        "OpenROAD.IRDropReport",
        "OpenROAD.RepairDesign",
        "OpenROAD.ResizerTimingPostGRT",
    ] {
        assert!(registry.contains(id), "{id} is not registered");
    }
    assert!(!registry.contains("OpenROAD.OpenGUI"));
    for id in registry.ids() {
        assert_eq!(registry.create(id).unwrap().id(), id);
    }
}

#[test]
fn every_step_declares_compatible_variables() {
    let registry = registry().unwrap();
    let ids = registry.ids().collect::<Vec<_>>();
    let flow = SequentialFlow::from_ids(&registry, &ids).unwrap();
    let vars = flow.variables().unwrap();
    assert!(vars.iter().any(|var| var.name == "FP_CORE_UTIL"));
    assert!(vars.iter().any(|var| var.name == "RSZ_CORNERS"));
}

#[test]
fn floorplan_transpiles_tracks_and_collects_outputs() {
    let dir = build_dir("floorplan_transpiles_tracks_and_collects_outputs");
    let step = OpenRoadStep::new(Kind::Floorplan);
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner {
        metrics: Some(|_| {
            json!({
                "design__instance__count": 10,
                "timing__setup__ws__corner:nom_tt_025C_1v80": "Infinity",
                "timing__setup__ws__corner:min_ff_n40C_1v95": 0.5,
            })
        }),
        ..Default::default()
    });
    let ctx = context(config, dir.join("01-floorplan"), runner.clone());
    let input = state(vec![(DesignView::Netlist, PathBuf::from("/in/spm.nl.v").into())]);

    let StepOutcome::Succeeded(delta) = step.execute(&ctx, &input) else {
        panic!("floorplan did not succeed");
    };

    let tracks = ctx.step_dir.join("config.tracks");
    assert_eq!(
        fs::read_to_string(&tracks).unwrap(),
        "make_tracks li1 -x_offset 0.23 -x_pitch 0.46 -y_offset 0.17 -y_pitch 0.34\n"
    );
    let invocation = runner.only_invocation();
    assert_eq!(
        invocation.env["TRACKS_INFO_FILE_PROCESSED"],
        tracks.display().to_string()
    );
    assert_eq!(invocation.command[0], "openroad");
    assert_eq!(
        invocation.command.last().unwrap(),
        "scripts/openroad/floorplan.tcl"
    );

    assert_eq!(
        delta.views[&DesignView::Odb].as_path().unwrap(),
        ctx.step_dir.join("spm.odb")
    );
    assert_eq!(delta.views.len(), Kind::Floorplan.outputs().len());
    assert_eq!(
        delta.metrics.get("design__instance__count"),
        Some(MetricValue::from(10))
    );
    assert_eq!(
        delta.metrics.get("timing__setup__ws"),
        Some(MetricValue::Finite(dec!(0.5)))
    );
    assert!(ctx.step_dir.join("run.sh").exists());
}

#[test]
fn base_environment_exports_step_inputs_and_pnr_settings() {
    let dir = build_dir("base_environment_exports_step_inputs_and_pnr_settings");
    let step = OpenRoadStep::new(Kind::DetailedPlacement);
    let config = resolve(&step, &dir, json!({ "PL_MAX_DISPLACEMENT_X": 250 }));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("step"), runner.clone());
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    assert!(matches!(step.execute(&ctx, &input), StepOutcome::Succeeded(_)));

    let env = runner.only_invocation().env;
    assert_eq!(env["CURRENT_ODB"], "/in/spm.odb");
    assert_eq!(
        env["SAVE_DEF"],
        ctx.step_dir.join("spm.def").display().to_string()
    );
    assert_eq!(env["PL_MAX_DISPLACEMENT_X"], "250");
    assert_eq!(env["PNR_EXCLUDED_CELLS"], "cell_a cell_b cell_c");
    assert!(env["PNR_LIBS"].ends_with("nom.lib"));
    assert!(env["SDC_IN"].ends_with("fallback.sdc"));
    assert!(!env.contains_key("CURRENT_NETLIST"));
    assert!(!env.contains_key("FP_CORE_UTIL"));
}

#[test]
fn missing_input_fails_before_running() {
    let dir = build_dir("missing_input_fails_before_running");
    let step = OpenRoadStep::new(Kind::GlobalRouting);
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("step"), runner.clone());

    let outcome = step.execute(&ctx, &PipelineState::new());

    assert!(matches!(
        outcome,
        StepOutcome::Failed(Error::MissingInput { view: DesignView::Odb, .. })
    ));
    assert!(runner.invocations().is_empty());
}

#[test_log::test]
fn io_placement_skips_with_a_pin_order_file() {
    let dir = build_dir("io_placement_skips_with_a_pin_order_file");
    let pin_order = dir.join("pin_order.cfg");
    fs::write(&pin_order, "#N\nclk\n").unwrap();
    let step = OpenRoadStep::new(Kind::IoPlacement);
    let config = resolve(
        &step,
        &dir,
        json!({ "FP_PIN_ORDER_CFG": pin_order.display().to_string() }),
    );
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("step"), runner.clone());
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    let outcome = step.execute(&ctx, &input);

    assert!(outcome.is_skipped());
    assert_eq!(outcome.apply(&input).unwrap(), input);
    assert!(runner.invocations().is_empty());
}

#[test_log::test]
fn global_placement_derives_target_density() {
    let dir = build_dir("global_placement_derives_target_density");
    let step = OpenRoadStep::new(Kind::GlobalPlacement);
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("step"), runner.clone());
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    assert!(matches!(step.execute(&ctx, &input), StepOutcome::Succeeded(_)));
    let env = runner.only_invocation().env;
    assert_eq!(env["PL_TARGET_DENSITY_PCT"], "65");
    assert!(!env.contains_key("__PL_SKIP_IO"));
}

#[test]
fn target_density_is_capped_and_respects_explicit_values() {
    let dir = build_dir("target_density_is_capped_and_respects_explicit_values");
    let step = OpenRoadStep::new(Kind::GlobalPlacementSkipIo);
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    let config = resolve(&step, &dir, json!({ "FP_CORE_UTIL": 95 }));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("capped"), runner.clone());
    assert!(matches!(step.execute(&ctx, &input), StepOutcome::Succeeded(_)));
    let env = runner.only_invocation().env;
    assert_eq!(env["PL_TARGET_DENSITY_PCT"], "100");
    assert_eq!(env["__PL_SKIP_IO"], "1");

    let config = resolve(&step, &dir, json!({ "PL_TARGET_DENSITY": 0.55 }));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config.clone(), dir.join("explicit"), runner.clone());
    assert!(matches!(step.execute(&ctx, &input), StepOutcome::Succeeded(_)));
    assert_eq!(config.decimal("PL_TARGET_DENSITY_PCT").unwrap(), dec!(55));
    assert_eq!(
        runner.only_invocation().env["PL_TARGET_DENSITY_PCT"],
        config.get("PL_TARGET_DENSITY_PCT").unwrap().to_env_string()
    );
}

#[test_log::test]
fn skip_io_placement_skips_random_equidistant_mode() {
    let dir = build_dir("skip_io_placement_skips_random_equidistant_mode");
    let step = OpenRoadStep::new(Kind::GlobalPlacementSkipIo);
    let config = resolve(&step, &dir, json!({ "FP_IO_MODE": "random_equidistant" }));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("step"), runner.clone());
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    assert!(step.execute(&ctx, &input).is_skipped());
    assert!(runner.invocations().is_empty());
}

#[test_log::test]
fn cts_needs_a_clock() {
    let dir = build_dir("cts_needs_a_clock");
    let step = OpenRoadStep::new(Kind::Cts);
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("no_clock"), runner.clone());
    assert!(step.execute(&ctx, &input).is_skipped());
    assert!(runner.invocations().is_empty());

    let config = resolve(
        &step,
        &dir,
        json!({ "CLOCK_PORT": ["clk"], "CTS_CORNERS": [MAX, MIN] }),
    );
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("clock_port"), runner.clone());
    assert!(matches!(step.execute(&ctx, &input), StepOutcome::Succeeded(_)));
    let env = runner.only_invocation().env;
    assert_eq!(env["CLOCK_NET"], "clk");
    assert!(env["RSZ_CORNER_0"].starts_with(MAX));
    assert!(!env.contains_key("RSZ_CORNER_1"));
}

#[test]
fn resizer_exports_each_library_set_once() {
    let dir = build_dir("resizer_exports_each_library_set_once");
    let step = OpenRoadStep::new(Kind::RepairDesignPostGpl);
    let config = resolve(&step, &dir, json!({}));

    let env = resizer_corner_env(&config, "RSZ_CORNERS").unwrap();

    let libs = dir.join("pdk");
    assert_eq!(env.len(), 2);
    assert_eq!(
        env["RSZ_CORNER_0"],
        format!("{NOM} {}", libs.join("nom.lib").display())
    );
    assert_eq!(
        env["RSZ_CORNER_1"],
        format!("{MIN} {}", libs.join("fast.lib").display())
    );

    let config = resolve(&step, &dir, json!({ "RSZ_CORNERS": [MAX] }));
    let env = resizer_corner_env(&config, "RSZ_CORNERS").unwrap();
    assert_eq!(env.len(), 1);
    assert!(env["RSZ_CORNER_0"].starts_with(MAX));
}

#[test]
fn deprecated_resizer_names_are_migrated() {
    let dir = build_dir("deprecated_resizer_names_are_migrated");
    let step = OpenRoadStep::new(Kind::RepairDesign);
    let config = resolve(
        &step,
        &dir,
        json!({ "PL_RESIZER_MAX_SLEW_MARGIN": 30, "FP_PDN_MACRO_HOOKS": "a vdd vss, b vdd vss" }),
    );
    assert_eq!(config.decimal("DESIGN_REPAIR_MAX_SLEW_PCT").unwrap(), dec!(30));
    assert_eq!(
        config.str_list("PDN_MACRO_CONNECTIONS").unwrap(),
        vec!["a vdd vss", "b vdd vss"]
    );
}

#[test]
fn resizer_dont_touch_settings_reach_the_script() {
    let dir = build_dir("resizer_dont_touch_settings_reach_the_script");
    let step = OpenRoadStep::new(Kind::RepairDesign);
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    let config = resolve(&step, &dir, json!({}));
    assert_eq!(config.str("RSZ_DONT_TOUCH_RX").unwrap(), "$^");
    assert!(config.opt_str_list("RSZ_DONT_TOUCH_LIST").unwrap().is_empty());

    let config = resolve(
        &step,
        &dir,
        json!({ "UNBUFFER_NETS": "^clk_.*", "RSZ_DONT_TOUCH_LIST": ["u_pll", "net7"] }),
    );
    assert_eq!(config.str("RSZ_DONT_TOUCH_RX").unwrap(), "^clk_.*");
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("step"), runner.clone());
    assert!(matches!(step.execute(&ctx, &input), StepOutcome::Succeeded(_)));

    let env = runner.only_invocation().env;
    assert_eq!(env["RSZ_DONT_TOUCH_RX"], "^clk_.*");
    assert_eq!(env["RSZ_DONT_TOUCH_LIST"], "u_pll net7");
    assert!(!env.contains_key("UNBUFFER_NETS"));
}

#[test]
fn antenna_steps_count_violating_nets() {
    let dir = build_dir("antenna_steps_count_violating_nets");
    let step = OpenRoadStep::new(Kind::GlobalRouting);
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::with_files(&[(
        "antenna.rpt",
        "Net: net_a\n  M1 violation\n  Net: net_b\nPartial: x\n",
    )]));
    let ctx = context(config, dir.join("step"), runner.clone());
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    let StepOutcome::Succeeded(delta) = step.execute(&ctx, &input) else {
        panic!("global routing did not succeed");
    };

    assert_eq!(delta.metrics.get(ANTENNA_VIOLATIONS), Some(MetricValue::from(2)));
    assert_eq!(
        fs::read_to_string(ctx.step_dir.join("antenna_net_list.txt")).unwrap(),
        "net_a\nnet_b\n"
    );
    assert_eq!(
        delta.views.keys().copied().collect::<Vec<_>>(),
        vec![DesignView::Odb, DesignView::Def]
    );
}

#[test]
fn detailed_routing_defaults_thread_count() {
    let dir = build_dir("detailed_routing_defaults_thread_count");
    let step = OpenRoadStep::new(Kind::DetailedRouting);
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("default"), runner.clone());
    assert!(matches!(step.execute(&ctx, &input), StepOutcome::Succeeded(_)));
    let threads = runner.only_invocation().env["DRT_THREADS"].parse::<usize>().unwrap();
    assert!(threads >= 1);

    let config = resolve(&step, &dir, json!({ "ROUTING_CORES": 3 }));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("explicit"), runner.clone());
    assert!(matches!(step.execute(&ctx, &input), StepOutcome::Succeeded(_)));
    assert_eq!(runner.only_invocation().env["DRT_THREADS"], "3");
}

#[test]
fn failed_tool_fails_the_step() {
    let dir = build_dir("failed_tool_fails_the_step");
    let step = OpenRoadStep::new(Kind::FillInsertion);
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner {
        fail: true,
        ..Default::default()
    });
    let ctx = context(config, dir.join("step"), runner);
    let input = state(vec![(DesignView::Odb, PathBuf::from("/in/spm.odb").into())]);

    let outcome = step.execute(&ctx, &input);

    assert!(matches!(outcome, StepOutcome::Failed(Error::ExternalTool { .. })));
    assert!(outcome.apply(&input).is_err());
}

#[test]
fn post_pnr_sta_runs_every_corner() {
    let dir = build_dir("post_pnr_sta_runs_every_corner");
    let signoff = dir.join("signoff.sdc");
    fs::write(&signoff, "").unwrap();
    let step = StaPostPnr::new();
    let config = resolve(
        &step,
        &dir,
        json!({ "SIGNOFF_SDC_FILE": signoff.display().to_string() }),
    );
    let runner = Arc::new(FakeRunner {
        metrics: Some(timing_metrics),
        ..Default::default()
    });
    let ctx = context(config, dir.join("sta"), runner.clone());
    let input = state(vec![
        (DesignView::Netlist, PathBuf::from("/in/spm.nl.v").into()),
        (DesignView::Odb, PathBuf::from("/in/spm.odb").into()),
        (
            DesignView::Spef,
            spefs(&[("nom_*", "/in/nom.spef"), ("min_*", "/in/min.spef"), ("max_*", "/in/max.spef")]),
        ),
        (DesignView::Lib, spefs(&[("old", "/in/old.lib")])),
    ]);

    let StepOutcome::Succeeded(delta) = step.execute(&ctx, &input) else {
        panic!("STA did not succeed");
    };

    let mut invocations = runner.invocations();
    invocations.sort_by(|a, b| a.work_dir.cmp(&b.work_dir));
    assert_eq!(invocations.len(), 3);
    for invocation in &invocations {
        let corner = &invocation.env["CURRENT_CORNER_NAME"];
        assert_eq!(invocation.command[0], "sta");
        assert_eq!(invocation.work_dir, ctx.step_dir.join(corner));
        assert!(invocation.env["SDC_IN"].ends_with("signoff.sdc"));
        assert_eq!(invocation.env["OPENSTA"], "1");
        let expected = format!("{corner} /in/{}.spef", &corner[..3]);
        assert_eq!(invocation.env["CURRENT_SPEF_BY_CORNER"], expected);
    }

    assert_eq!(
        delta.metrics.get("timing__setup__ws"),
        Some(MetricValue::Finite(dec!(-0.5)))
    );
    assert_eq!(
        delta.metrics.get("timing__setup_vio__count"),
        Some(MetricValue::from(3))
    );
    let summary = fs::read_to_string(ctx.step_dir.join(sta::SUMMARY_FILE)).unwrap();
    assert!(summary.contains("Overall"));
    assert!(summary.contains(MAX));

    let output = PipelineState::new().merge(&delta).unwrap();
    let merged = input.merge(&delta).unwrap();
    let libs = merged.per_corner(DesignView::Lib).unwrap();
    assert_eq!(libs.len(), 4);
    assert_eq!(
        libs[MIN],
        ctx.step_dir.join(MIN).join(format!("spm__{MIN}.lib"))
    );
    assert_eq!(output.per_corner(DesignView::Sdf).unwrap().len(), 3);
}

#[test]
fn post_pnr_sta_fails_without_a_compatible_spef() {
    let dir = build_dir("post_pnr_sta_fails_without_a_compatible_spef");
    let step = StaPostPnr::new();
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("sta"), runner);
    let input = state(vec![
        (DesignView::Netlist, PathBuf::from("/in/spm.nl.v").into()),
        (DesignView::Odb, PathBuf::from("/in/spm.odb").into()),
        (DesignView::Spef, spefs(&[("nom_*", "/in/nom.spef")])),
    ]);

    match step.execute(&ctx, &input) {
        StepOutcome::Failed(Error::CornerResolution { corner, what }) => {
            assert_eq!(corner.as_str(), MIN);
            assert_eq!(what, "SPEF");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn pre_pnr_sta_collects_sdf_files() {
    let dir = build_dir("pre_pnr_sta_collects_sdf_files");
    let step = StaPrePnr::new();
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::with_files(&[
        ("spm__nom_tt_025C_1v80.sdf", ""),
        ("notes.txt", ""),
    ]));
    let ctx = context(config, dir.join("sta"), runner.clone());
    let input = state(vec![
        (DesignView::Netlist, PathBuf::from("/in/spm.nl.v").into()),
        (DesignView::Sdf, spefs(&[(MIN, "/in/min.sdf")])),
    ]);

    let StepOutcome::Succeeded(delta) = step.execute(&ctx, &input) else {
        panic!("STA did not succeed");
    };

    let invocation = runner.only_invocation();
    assert_eq!(invocation.env["CURRENT_CORNER_NAME"], NOM);
    assert!(invocation.env["CURRENT_CORNER_TIMING_VIEWS"].ends_with("nom.lib"));
    assert_eq!(
        invocation.command,
        vec!["sta", "-no_splash", "-exit", "scripts/openroad/sta/corner.tcl"]
    );

    let merged = input.merge(&delta).unwrap();
    let sdfs = merged.per_corner(DesignView::Sdf).unwrap();
    assert_eq!(sdfs.len(), 2);
    assert_eq!(sdfs[NOM], ctx.step_dir.join("spm__nom_tt_025C_1v80.sdf"));
    assert_eq!(
        merged.path(DesignView::Sdc).unwrap(),
        ctx.step_dir.join("spm.sdc")
    );
}

#[test]
fn rcx_extracts_each_ruleset() {
    let dir = build_dir("rcx_extracts_each_ruleset");
    let step = Rcx::new();
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("rcx"), runner.clone());
    let input = state(vec![(DesignView::Def, PathBuf::from("/in/spm.def").into())]);

    let StepOutcome::Succeeded(delta) = step.execute(&ctx, &input) else {
        panic!("RCX did not succeed");
    };

    let spefs = delta.views[&DesignView::Spef].as_per_corner().unwrap();
    assert_eq!(
        spefs.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
        vec!["nom_*", "min_*"]
    );
    assert_eq!(spefs["nom_*"], ctx.step_dir.join("nom").join("spm.nom.spef"));
    assert!(spefs["min_*"].exists());

    let mut invocations = runner.invocations();
    invocations.sort_by(|a, b| a.work_dir.cmp(&b.work_dir));
    assert_eq!(invocations.len(), 2);
    assert!(invocations[0].env["RCX_LEF"].ends_with("min.tlef"));
    assert!(invocations[0].env["RCX_RULESET"].ends_with("min.rules"));
    assert_eq!(invocations[1].env["CURRENT_DEF"], "/in/spm.def");
}

#[test]
fn rcx_fails_without_a_tech_lef() {
    let dir = build_dir("rcx_fails_without_a_tech_lef");
    let rules = dir.join("max.rules");
    fs::write(&rules, "").unwrap();
    let step = Rcx::new();
    let config = resolve(
        &step,
        &dir,
        json!({ "RCX_RULESETS": { "max_*": rules.display().to_string() } }),
    );
    let ctx = context(config, dir.join("rcx"), Arc::new(FakeRunner::default()));
    let input = state(vec![(DesignView::Def, PathBuf::from("/in/spm.def").into())]);

    assert!(matches!(
        step.execute(&ctx, &input),
        StepOutcome::Failed(Error::CornerResolution { what: "tech LEF", .. })
    ));
}

#[test]
fn rcx_patterns_with_the_same_sanitized_name_use_separate_directories() {
    let dir = build_dir("rcx_patterns_with_the_same_sanitized_name_use_separate_directories");
    let (a, b, lef) = (dir.join("a.rules"), dir.join("b.rules"), dir.join("any.tlef"));
    for path in [&a, &b, &lef] {
        fs::write(path, "").unwrap();
    }
    let step = Rcx::new();
    let config = resolve(
        &step,
        &dir,
        json!({
            "RCX_RULESETS": { "nom_*": a.display().to_string(), "*nom": b.display().to_string() },
            "TECH_LEFS": { "*": lef.display().to_string() },
        }),
    );
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("rcx"), runner.clone());
    let input = state(vec![(DesignView::Def, PathBuf::from("/in/spm.def").into())]);

    let StepOutcome::Succeeded(delta) = step.execute(&ctx, &input) else {
        panic!("RCX did not succeed");
    };

    let spefs = delta.views[&DesignView::Spef].as_per_corner().unwrap();
    assert_eq!(spefs["nom_*"], ctx.step_dir.join("nom").join("spm.nom.spef"));
    assert_eq!(spefs["*nom"], ctx.step_dir.join("nom-1").join("spm.nom-1.spef"));
    let mut work_dirs = runner
        .invocations()
        .into_iter()
        .map(|invocation| invocation.work_dir)
        .collect::<Vec<_>>();
    work_dirs.sort();
    work_dirs.dedup();
    assert_eq!(work_dirs.len(), 2);
}

#[test]
fn ir_drop_report_reads_the_report() {
    let dir = build_dir("ir_drop_report_reads_the_report");
    let step = IrDropReport::new();
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::with_files(&[(
        irdrop::REPORT_FILE,
        "########## IR report #################\n\
         Worstcase voltage: 1.78e+00 V\n\
         Average IR drop  : 1.2e-03 V\n\
         Worstcase IR drop: 2.0e-02 V\n",
    )]));
    let ctx = context(config, dir.join("irdrop"), runner.clone());
    let input = state(vec![
        (DesignView::Odb, PathBuf::from("/in/spm.odb").into()),
        (DesignView::Spef, spefs(&[("nom_*", "/in/nom.spef"), ("min_*", "/in/min.spef")])),
    ]);

    let StepOutcome::Succeeded(delta) = step.execute(&ctx, &input) else {
        panic!("IR drop analysis did not succeed");
    };

    assert_eq!(
        runner.only_invocation().env["CURRENT_SPEF_DEFAULT_CORNER"],
        "/in/nom.spef"
    );
    assert_eq!(
        delta.metrics.get("ir__voltage__worst"),
        Some(MetricValue::Finite(dec!(1.78)))
    );
    assert_eq!(
        delta.metrics.get("ir__drop__worst"),
        Some(MetricValue::Finite(dec!(0.02)))
    );
}

#[test]
fn ir_drop_report_needs_exactly_one_default_spef() {
    let dir = build_dir("ir_drop_report_needs_exactly_one_default_spef");
    let step = IrDropReport::new();
    let config = resolve(&step, &dir, json!({}));
    let input = state(vec![
        (DesignView::Odb, PathBuf::from("/in/spm.odb").into()),
        (DesignView::Spef, spefs(&[("nom_*", "/in/a.spef"), ("*", "/in/b.spef")])),
    ]);
    let ctx = context(config.clone(), dir.join("ambiguous"), Arc::new(FakeRunner::default()));
    assert!(matches!(
        step.execute(&ctx, &input),
        StepOutcome::Failed(Error::MalformedState { view: DesignView::Spef, .. })
    ));

    let input = state(vec![
        (DesignView::Odb, PathBuf::from("/in/spm.odb").into()),
        (DesignView::Spef, spefs(&[("max_*", "/in/max.spef")])),
    ]);
    let ctx = context(config.clone(), dir.join("missing"), Arc::new(FakeRunner::default()));
    assert!(matches!(
        step.execute(&ctx, &input),
        StepOutcome::Failed(Error::CornerResolution { .. })
    ));

    let input = state(vec![
        (DesignView::Odb, PathBuf::from("/in/spm.odb").into()),
        (DesignView::Spef, spefs(&[("nom_*", "/in/nom.spef")])),
    ]);
    let ctx = context(config, dir.join("no_report"), Arc::new(FakeRunner::default()));
    assert!(matches!(
        step.execute(&ctx, &input),
        StepOutcome::Failed(Error::Io(_))
    ));
}

#[test_log::test]
fn sdc_check_runs_no_tool() {
    let dir = build_dir("sdc_check_runs_no_tool");
    let step = CheckSdcFiles::new();
    let config = resolve(&step, &dir, json!({}));
    let runner = Arc::new(FakeRunner::default());
    let ctx = context(config, dir.join("sdc"), runner.clone());

    let StepOutcome::Succeeded(delta) = step.execute(&ctx, &PipelineState::new()) else {
        panic!("SDC check did not succeed");
    };
    assert!(delta.is_empty());
    assert!(runner.invocations().is_empty());
}

#[test]
fn run_script_reproduces_the_invocation() {
    let dir = build_dir("run_script_reproduces_the_invocation");
    let invocation = Invocation {
        command: vec!["openroad".into(), "-exit".into(), "my script.tcl".into()],
        env: [
            ("PNR_LIBS".to_string(), "a.lib b.lib".to_string()),
            ("DESIGN_NAME".to_string(), "spm".to_string()),
        ]
        .into_iter()
        .collect(),
        work_dir: dir.clone(),
        log: dir.join("openroad.log"),
    };

    let path = write_run_script(&invocation).unwrap();

    let script = fs::read_to_string(&path).unwrap();
    assert!(script.starts_with("#!/bin/bash"));
    assert!(script.contains("export PNR_LIBS='a.lib b.lib'\n"));
    assert!(script.contains("export DESIGN_NAME=spm\n"));
    assert!(script.contains("openroad -exit 'my script.tcl'"));
    use std::os::unix::fs::PermissionsExt;
    assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o755);
}

#[test]
fn shell_quoting() {
    assert_eq!(quote("plain/path-1.v"), "plain/path-1.v");
    assert_eq!(quote(""), "''");
    assert_eq!(quote("two words"), "'two words'");
    assert_eq!(quote("it's"), r"'it'\''s'");
    assert_eq!(quote("$HOME"), "'$HOME'");
}
