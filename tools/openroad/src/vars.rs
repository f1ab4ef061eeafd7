//! Configuration variables shared by families of OpenROAD steps.

use config::{Migration, VarType, Variable};

fn decimal(name: &str, description: &str, default: impl Into<serde_json::Value>) -> Variable {
    Variable::new(name, VarType::Decimal, description).default(default)
}

fn flag(name: &str, description: &str, default: bool) -> Variable {
    Variable::new(name, VarType::Bool, description).default(default)
}

fn pdk_decimal(name: &str, description: &str) -> Variable {
    Variable::new(name, VarType::Decimal, description)
        .units("µm")
        .pdk()
}

fn rect() -> VarType {
    VarType::Tuple(vec![VarType::Decimal; 4])
}

/// Variables read by every OpenROAD step.
pub fn openroad_variables() -> Vec<Variable> {
    vec![
        flag(
            "PDN_CONNECT_MACROS_TO_GRID",
            "Enables the connection of macros to the top level power grid.",
            true,
        )
        .alias("FP_PDN_ENABLE_MACROS_GRID"),
        Variable::new(
            "PDN_MACRO_CONNECTIONS",
            VarType::optional(VarType::list(VarType::Str)),
            "Explicit power connections of macro instances, each as `<instance> <vdd_net> <gnd_net> <vdd_pin> <gnd_pin>`.",
        )
        .alias_with("FP_PDN_MACRO_HOOKS", Migration::CommaList),
        flag(
            "PDN_ENABLE_GLOBAL_CONNECTIONS",
            "Enables the creation of global connections in PDN generation.",
            true,
        )
        .alias("FP_PDN_ENABLE_GLOBAL_CONNECTIONS"),
        pnr_sdc_file(),
    ]
}

pub(crate) fn pnr_sdc_file() -> Variable {
    Variable::new(
        "PNR_SDC_FILE",
        VarType::optional(VarType::Path),
        "The SDC file used during all implementation (PnR) steps.",
    )
}

pub(crate) fn signoff_sdc_file() -> Variable {
    Variable::new(
        "SIGNOFF_SDC_FILE",
        VarType::optional(VarType::Path),
        "The SDC file used for STA during signoff.",
    )
}

pub(crate) fn fp_core_util() -> Variable {
    decimal("FP_CORE_UTIL", "The core utilization percentage.", 50).units("%")
}

pub(crate) fn fp_io_mode() -> Variable {
    Variable::new(
        "FP_IO_MODE",
        VarType::literals(["matching", "random_equidistant"]),
        "The mode of the random IO placement option.",
    )
    .default("matching")
}

/// Pin shape variables for I/O placement.
pub fn io_layer_variables() -> Vec<Variable> {
    vec![
        decimal(
            "FP_IO_VEXTEND",
            "Extends the vertical io pins outside of the die by the specified units.",
            0,
        )
        .units("µm"),
        decimal(
            "FP_IO_HEXTEND",
            "Extends the horizontal io pins outside of the die by the specified units.",
            0,
        )
        .units("µm"),
        decimal("FP_IO_VLENGTH", "The length of the vertical IOs.", 4).units("µm"),
        decimal("FP_IO_HLENGTH", "The length of the horizontal IOs.", 4).units("µm"),
        decimal(
            "FP_IO_VTHICKNESS_MULT",
            "A multiplier for vertical pin thickness. Base thickness is the pin layer's min width.",
            2,
        ),
        decimal(
            "FP_IO_HTHICKNESS_MULT",
            "A multiplier for horizontal pin thickness. Base thickness is the pin layer's min width.",
            2,
        ),
    ]
}

/// Power distribution network variables.
pub fn pdn_variables() -> Vec<Variable> {
    let mut vars = vec![
        flag(
            "FP_PDN_SKIPTRIM",
            "Enables `-skip_trim` during pdngen, skipping the metal trim step.",
            false,
        ),
        flag("FP_PDN_CORE_RING", "Enables adding a core ring around the design.", false),
        flag(
            "FP_PDN_ENABLE_RAILS",
            "Enables the creation of rails in the power grid.",
            true,
        ),
        flag(
            "FP_PDN_CHECK_NODES",
            "Enables checking for unconnected nodes in the power grid.",
            true,
        ),
        decimal(
            "FP_PDN_HORIZONTAL_HALO",
            "The horizontal halo around macros during power grid insertion.",
            10,
        )
        .units("µm"),
        decimal(
            "FP_PDN_VERTICAL_HALO",
            "The vertical halo around macros during power grid insertion.",
            10,
        )
        .units("µm"),
        flag(
            "DESIGN_IS_CORE",
            "Controls the layers used in the power grid. Set to false for macros.",
            true,
        ),
    ];
    vars.extend(
        [
            ("FP_PDN_RAIL_OFFSET", "The offset of the power distribution network rails."),
            ("FP_PDN_VWIDTH", "The strap width of the vertical layer."),
            ("FP_PDN_HWIDTH", "The strap width of the horizontal layer."),
            ("FP_PDN_VSPACING", "The spacing between vertical straps of a set."),
            ("FP_PDN_HSPACING", "The spacing between horizontal straps of a set."),
            ("FP_PDN_VPITCH", "The distance between sets of vertical straps."),
            ("FP_PDN_HPITCH", "The distance between sets of horizontal straps."),
            ("FP_PDN_VOFFSET", "The initial offset of the sets of vertical straps."),
            ("FP_PDN_HOFFSET", "The initial offset of the sets of horizontal straps."),
            ("FP_PDN_CORE_RING_VWIDTH", "The width of the vertical core ring layer."),
            ("FP_PDN_CORE_RING_HWIDTH", "The width of the horizontal core ring layer."),
            ("FP_PDN_CORE_RING_VSPACING", "The spacing of the vertical core ring layer."),
            ("FP_PDN_CORE_RING_HSPACING", "The spacing of the horizontal core ring layer."),
            ("FP_PDN_CORE_RING_VOFFSET", "The offset of the vertical core ring layer."),
            ("FP_PDN_CORE_RING_HOFFSET", "The offset of the horizontal core ring layer."),
        ]
        .into_iter()
        .map(|(name, description)| pdk_decimal(name, description)),
    );
    vars.extend([
        Variable::new(
            "FP_PDN_RAIL_LAYER",
            VarType::Str,
            "The metal layer used for PDN rails.",
        )
        .alias("FP_PDN_RAILS_LAYER")
        .pdk(),
        pdk_decimal("FP_PDN_RAIL_WIDTH", "The width of the PDN rails."),
        Variable::new(
            "FP_PDN_HORIZONTAL_LAYER",
            VarType::Str,
            "The horizontal PDN layer.",
        )
        .alias("FP_PDN_UPPER_LAYER")
        .pdk(),
        Variable::new("FP_PDN_VERTICAL_LAYER", VarType::Str, "The vertical PDN layer.")
            .alias("FP_PDN_LOWER_LAYER")
            .pdk(),
    ]);
    vars
}

/// Layer limits and capacity adjustments for routing.
pub fn routing_layer_variables() -> Vec<Variable> {
    vec![
        Variable::new(
            "RT_CLOCK_MIN_LAYER",
            VarType::optional(VarType::Str),
            "The lowest layer used to route clock nets.",
        ),
        Variable::new(
            "RT_CLOCK_MAX_LAYER",
            VarType::optional(VarType::Str),
            "The highest layer used to route clock nets.",
        ),
        decimal(
            "GRT_ADJUSTMENT",
            "Reduction in the routing capacity of the edges between the cells in the global routing graph.",
            0.3,
        ),
        Variable::new(
            "GRT_MACRO_EXTENSION",
            VarType::Int,
            "The number of GCells added to the blockages boundaries from macros.",
        )
        .default(0),
    ]
}

/// Detailed placement variables.
pub fn dpl_variables() -> Vec<Variable> {
    vec![
        flag(
            "PL_OPTIMIZE_MIRRORING",
            "Runs an optimize_mirroring pass after detailed placement.",
            true,
        ),
        decimal(
            "PL_MAX_DISPLACEMENT_X",
            "How far an instance can be moved along the X-axis when finding a site.",
            500,
        )
        .units("µm"),
        decimal(
            "PL_MAX_DISPLACEMENT_Y",
            "How far an instance can be moved along the Y-axis when finding a site.",
            100,
        )
        .units("µm"),
    ]
}

/// Global routing variables.
pub fn grt_variables() -> Vec<Variable> {
    let mut vars = routing_layer_variables();
    vars.extend([
        Variable::new(
            "DIODE_PADDING",
            VarType::optional(VarType::Int),
            "Diode cell padding, increasing the width of diode cells during placement checks.",
        )
        .units("sites"),
        flag(
            "GRT_ALLOW_CONGESTION",
            "Allow congestion during global routing.",
            false,
        ),
        Variable::new(
            "GRT_ANTENNA_ITERS",
            VarType::Int,
            "The maximum number of iterations for global antenna repairs.",
        )
        .default(3)
        .alias("GRT_ANT_ITERS"),
        Variable::new(
            "GRT_OVERFLOW_ITERS",
            VarType::Int,
            "The maximum number of iterations waiting for the overflow to reach the desired value.",
        )
        .default(50),
        Variable::new(
            "GRT_ANTENNA_MARGIN",
            VarType::Int,
            "The margin to over fix antenna violations.",
        )
        .default(10)
        .units("%")
        .alias("GRT_ANT_MARGIN"),
    ]);
    vars
}

/// Resizer variables.
pub fn rsz_variables() -> Vec<Variable> {
    let mut vars = dpl_variables();
    vars.extend([
        Variable::new(
            "RSZ_DONT_TOUCH_RX",
            VarType::Str,
            "A regular expression matching nets and instances the resizer must not modify.",
        )
        .default("$^")
        .alias("UNBUFFER_NETS"),
        Variable::new(
            "RSZ_DONT_TOUCH_LIST",
            VarType::optional(VarType::list(VarType::Str)),
            "Nets and instances the resizer must not modify.",
        ),
        Variable::new(
            "RSZ_DONT_USE_CELLS",
            VarType::optional(VarType::list(VarType::Str)),
            "Cells the resizer must not use.",
        )
        .alias("DONT_USE_CELLS"),
        Variable::new(
            "RSZ_CORNERS",
            VarType::optional(VarType::list(VarType::Str)),
            "The corners used during resizer optimizations. Defaults to `STA_CORNERS`.",
        ),
    ]);
    vars
}

/// Variables of floorplan initialization.
pub(crate) fn floorplan_variables() -> Vec<Variable> {
    let margin = |name: &str, side: &str, unit: &str, default: i32| {
        decimal(
            name,
            &format!("The core margin, in multiples of site {unit}, from the {side} boundary."),
            default,
        )
    };
    vec![
        Variable::new(
            "FP_SIZING",
            VarType::literals(["relative", "absolute"]),
            "Whether to size the die relative to `FP_CORE_UTIL` or absolutely using `DIE_AREA`.",
        )
        .default("relative"),
        decimal("FP_ASPECT_RATIO", "The core's aspect ratio (height / width).", 1),
        fp_core_util(),
        Variable::new(
            "FP_OBSTRUCTIONS",
            VarType::optional(VarType::list(rect())),
            "Obstructions applied at floorplanning, each as `x0 y0 x1 y1`.",
        )
        .units("µm"),
        Variable::new(
            "CORE_AREA",
            VarType::optional(rect()),
            "The core area used when `FP_SIZING` is `absolute`, as `x0 y0 x1 y1`.",
        )
        .units("µm"),
        margin("BOTTOM_MARGIN_MULT", "bottom", "heights", 4),
        margin("TOP_MARGIN_MULT", "top", "heights", 4),
        margin("LEFT_MARGIN_MULT", "left", "widths", 12),
        margin("RIGHT_MARGIN_MULT", "right", "widths", 12),
        Variable::new(
            "EXTRA_SITES",
            VarType::optional(VarType::list(VarType::Str)),
            "Sites other than the placement site to create rows for.",
        )
        .pdk(),
    ]
}

pub(crate) fn io_placement_variables() -> Vec<Variable> {
    let mut vars = io_layer_variables();
    vars.extend([
        fp_io_mode(),
        decimal("FP_IO_MIN_DISTANCE", "The minimum distance between the IOs.", 3).units("µm"),
        Variable::new(
            "FP_PIN_ORDER_CFG",
            VarType::optional(VarType::Path),
            "A custom pin configuration file.",
        ),
    ]);
    vars
}

pub(crate) fn tap_variables() -> Vec<Variable> {
    vec![
        decimal(
            "FP_TAP_HORIZONTAL_HALO",
            "The horizontal halo around macros during tap insertion.",
            10,
        )
        .units("µm"),
        decimal(
            "FP_TAP_VERTICAL_HALO",
            "The vertical halo around macros during tap insertion.",
            10,
        )
        .units("µm"),
    ]
}

pub(crate) fn generate_pdn_variables() -> Vec<Variable> {
    let mut vars = pdn_variables();
    vars.push(
        Variable::new(
            "FP_PDN_CFG",
            VarType::optional(VarType::Path),
            "A custom PDN configuration file. Defaults to the bundled configuration.",
        )
        .alias("PDN_CFG"),
    );
    vars
}

pub(crate) fn global_placement_variables() -> Vec<Variable> {
    let mut vars = routing_layer_variables();
    vars.extend([
        Variable::new(
            "PL_TARGET_DENSITY_PCT",
            VarType::optional(VarType::Decimal),
            "The desired placement density of cells. Defaults to `FP_CORE_UTIL + 5 * GPL_CELL_PADDING + 10`.",
        )
        .units("%")
        .alias_with("PL_TARGET_DENSITY", Migration::FractionToPercent),
        flag("PL_TIME_DRIVEN", "Use time driven placement.", true),
        flag(
            "PL_SKIP_INITIAL_PLACEMENT",
            "Skip the initial placement.",
            false,
        ),
        flag("PL_ROUTABILITY_DRIVEN", "Use routability driven placement.", true),
        fp_core_util(),
    ]);
    vars
}

pub(crate) fn detailed_routing_variables() -> Vec<Variable> {
    vec![
        Variable::new(
            "DRT_THREADS",
            VarType::optional(VarType::Int),
            "The number of detailed routing threads. Defaults to the host's parallelism.",
        )
        .alias("ROUTING_CORES"),
        Variable::new(
            "DRT_MIN_LAYER",
            VarType::optional(VarType::Str),
            "An override of the lowest layer used in detailed routing.",
        ),
        Variable::new(
            "DRT_MAX_LAYER",
            VarType::optional(VarType::Str),
            "An override of the highest layer used in detailed routing.",
        ),
        Variable::new(
            "DRT_OPT_ITERS",
            VarType::Int,
            "The maximum number of optimization iterations during detailed routing.",
        )
        .default(64),
    ]
}

pub(crate) fn cts_variables() -> Vec<Variable> {
    vec![
        Variable::new(
            "CTS_SINK_CLUSTERING_SIZE",
            VarType::Int,
            "The maximum number of sinks per cluster.",
        )
        .default(25),
        decimal(
            "CTS_SINK_CLUSTERING_MAX_DIAMETER",
            "The maximum diameter of a sink cluster.",
            50,
        )
        .units("µm"),
        decimal(
            "CTS_CLK_MAX_WIRE_LENGTH",
            "The maximum wire length on the clock net.",
            0,
        )
        .units("µm"),
        flag(
            "CTS_DISABLE_POST_PROCESSING",
            "Disables post-CTS processing of outlier sinks.",
            false,
        ),
        decimal(
            "CTS_DISTANCE_BETWEEN_BUFFERS",
            "The distance between buffers when creating the clock tree.",
            0,
        )
        .units("µm"),
        Variable::new(
            "CTS_CORNERS",
            VarType::optional(VarType::list(VarType::Str)),
            "The corners used during clock tree synthesis. Defaults to `STA_CORNERS`.",
        ),
    ]
}

pub(crate) fn repair_design_variables() -> Vec<Variable> {
    vec![
        flag(
            "DESIGN_REPAIR_BUFFER_INPUT_PORTS",
            "Insert buffers on input ports during design repair.",
            true,
        )
        .alias("PL_RESIZER_BUFFER_INPUT_PORTS"),
        flag(
            "DESIGN_REPAIR_BUFFER_OUTPUT_PORTS",
            "Insert buffers on output ports during design repair.",
            true,
        )
        .alias("PL_RESIZER_BUFFER_OUTPUT_PORTS"),
        flag(
            "DESIGN_REPAIR_TIE_FANOUT",
            "Repair the fanout of tie cells during design repair.",
            true,
        )
        .alias("PL_RESIZER_REPAIR_TIE_FANOUT"),
        flag(
            "DESIGN_REPAIR_TIE_SEPARATION",
            "Allow tie separation during design repair.",
            false,
        )
        .alias("PL_RESIZER_TIE_SEPERATION"),
        decimal(
            "DESIGN_REPAIR_MAX_WIRE_LENGTH",
            "The maximum wire length before the resizer inserts buffers. Zero disables buffering.",
            0,
        )
        .units("µm")
        .alias("PL_RESIZER_MAX_WIRE_LENGTH"),
        decimal(
            "DESIGN_REPAIR_MAX_SLEW_PCT",
            "The slew margin during design repair.",
            20,
        )
        .units("%")
        .alias("PL_RESIZER_MAX_SLEW_MARGIN"),
        decimal(
            "DESIGN_REPAIR_MAX_CAP_PCT",
            "The capacitance margin during design repair.",
            20,
        )
        .units("%")
        .alias("PL_RESIZER_MAX_CAP_MARGIN"),
    ]
}

pub(crate) fn repair_design_post_grt_variables() -> Vec<Variable> {
    vec![
        decimal(
            "GRT_DESIGN_REPAIR_MAX_WIRE_LENGTH",
            "The maximum wire length before the resizer inserts buffers after global routing. Zero disables buffering.",
            0,
        )
        .units("µm")
        .alias("GLB_RESIZER_MAX_WIRE_LENGTH"),
        decimal(
            "GRT_DESIGN_REPAIR_MAX_SLEW_PCT",
            "The slew margin during post-GRT design repair.",
            10,
        )
        .units("%")
        .alias("GLB_RESIZER_MAX_SLEW_MARGIN"),
        decimal(
            "GRT_DESIGN_REPAIR_MAX_CAP_PCT",
            "The capacitance margin during post-GRT design repair.",
            10,
        )
        .units("%")
        .alias("GLB_RESIZER_MAX_CAP_MARGIN"),
    ]
}

pub(crate) fn timing_post_cts_variables() -> Vec<Variable> {
    vec![
        decimal(
            "PL_RESIZER_HOLD_SLACK_MARGIN",
            "The slack margin when fixing hold violations.",
            0.1,
        )
        .units("ns"),
        decimal(
            "PL_RESIZER_SETUP_SLACK_MARGIN",
            "The slack margin when fixing setup violations.",
            0.05,
        )
        .units("ns"),
        decimal(
            "PL_RESIZER_HOLD_MAX_BUFFER_PCT",
            "The maximum number of buffers inserted to fix hold violations, as a percentage of instances.",
            50,
        )
        .alias("PL_RESIZER_HOLD_MAX_BUFFER_PERCENT"),
        decimal(
            "PL_RESIZER_SETUP_MAX_BUFFER_PCT",
            "The maximum number of buffers inserted to fix setup violations, as a percentage of instances.",
            50,
        )
        .units("%")
        .alias("PL_RESIZER_SETUP_MAX_BUFFER_PERCENT"),
        flag(
            "PL_RESIZER_ALLOW_SETUP_VIOS",
            "Allow setup violations when fixing hold violations.",
            false,
        ),
    ]
}

pub(crate) fn timing_post_grt_variables() -> Vec<Variable> {
    vec![
        decimal(
            "GRT_RESIZER_HOLD_SLACK_MARGIN",
            "The slack margin when fixing hold violations after global routing.",
            0.05,
        )
        .units("ns")
        .alias("GLB_RESIZER_HOLD_SLACK_MARGIN"),
        decimal(
            "GRT_RESIZER_SETUP_SLACK_MARGIN",
            "The slack margin when fixing setup violations after global routing.",
            0.025,
        )
        .units("ns")
        .alias("GLB_RESIZER_SETUP_SLACK_MARGIN"),
        decimal(
            "GRT_RESIZER_HOLD_MAX_BUFFER_PCT",
            "The maximum number of buffers inserted to fix hold violations, as a percentage of instances.",
            50,
        )
        .units("%")
        .alias("GLB_RESIZER_HOLD_MAX_BUFFER_PERCENT"),
        decimal(
            "GRT_RESIZER_SETUP_MAX_BUFFER_PCT",
            "The maximum number of buffers inserted to fix setup violations, as a percentage of instances.",
            50,
        )
        .units("%")
        .alias("GLB_RESIZER_SETUP_MAX_BUFFER_PERCENT"),
        flag(
            "GRT_RESIZER_ALLOW_SETUP_VIOS",
            "Allow setup violations when fixing hold violations.",
            false,
        )
        .alias("GLB_RESIZER_ALLOW_SETUP_VIOS"),
    ]
}

pub(crate) fn sta_variables() -> Vec<Variable> {
    vec![flag(
        "STA_MACRO_PRIORITIZE_NL",
        "Prefer netlists and SPEF files over LIB files for macros that have both.",
        true,
    )]
}

pub(crate) fn rcx_variables() -> Vec<Variable> {
    vec![
        flag(
            "RCX_MERGE_VIA_WIRE_RES",
            "Merge via and wire resistances.",
            true,
        ),
        Variable::new(
            "RCX_SDC_FILE",
            VarType::optional(VarType::Path),
            "The SDC file used for RCX-based STA.",
        ),
        Variable::new(
            "RCX_RULESETS",
            VarType::dict(VarType::Path),
            "OpenRCX extraction rules keyed by corner pattern.",
        )
        .pdk(),
    ]
}
