//! Variables read by every flow, independent of the steps it runs.

use config::{VarType, Variable};

/// Design and PDK variables shared by all steps.
pub fn flow_variables() -> Vec<Variable> {
    vec![
        Variable::new("DESIGN_NAME", VarType::Str, "The name of the top level module."),
        Variable::new(
            "CLOCK_PORT",
            VarType::optional(VarType::list(VarType::Str)),
            "The name of the design's clock port(s).",
        ),
        Variable::new(
            "CLOCK_NET",
            VarType::optional(VarType::list(VarType::Str)),
            "The name of the net(s) driven by the clock port(s). Defaults to the clock port.",
        ),
        Variable::new("CLOCK_PERIOD", VarType::Decimal, "The clock period.")
            .default(10)
            .units("ns"),
        Variable::new(
            "FALLBACK_SDC_FILE",
            VarType::optional(VarType::Path),
            "The SDC file used when a step has no dedicated constraints.",
        ),
        Variable::new(
            "SCRIPTS_DIR",
            VarType::Str,
            "The directory holding the Tcl scripts run by external tools.",
        )
        .default("scripts"),
        Variable::new(
            "STA_CORNERS",
            VarType::list(VarType::Str),
            "The timing corners to analyze.",
        )
        .pdk(),
        Variable::new(
            "DEFAULT_CORNER",
            VarType::Str,
            "The corner used when a step analyzes a single corner.",
        )
        .pdk(),
        Variable::new(
            "LIB",
            VarType::dict(VarType::list(VarType::Path)),
            "Timing libraries keyed by corner pattern.",
        )
        .pdk(),
        Variable::new(
            "TECH_LEFS",
            VarType::dict(VarType::Path),
            "Technology LEF files keyed by corner pattern.",
        )
        .pdk(),
        Variable::new(
            "CELL_LEFS",
            VarType::list(VarType::Path),
            "Abstracts of the standard cells.",
        )
        .pdk(),
        Variable::new(
            "EXTRA_LEFS",
            VarType::optional(VarType::list(VarType::Path)),
            "Abstracts of macros instantiated by the design.",
        ),
        Variable::new(
            "FP_TRACKS_INFO",
            VarType::Path,
            "The legacy routing track definition file.",
        )
        .pdk(),
        Variable::new(
            "PNR_EXCLUSION_CELL_LIST",
            VarType::Path,
            "A file listing cells that must not be used during PnR.",
        )
        .pdk(),
        Variable::new(
            "GPL_CELL_PADDING",
            VarType::Decimal,
            "Cell padding used by global placement.",
        )
        .units("sites")
        .pdk(),
    ]
}
