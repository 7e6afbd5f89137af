pub mod fusion;
pub mod quality;
pub mod scorecard;

pub use fusion::{fuse_metrics, metrics_from_profile, FusionDebug};
pub use quality::{
    altman_z_score, detect_value_trap, earnings_quality, graham_number, piotroski_f_score, roic, AltmanZ,
    EarningsQuality, PiotroskiScore, ValueTrap,
};
pub use scorecard::{build_scorecard, decide_verdict, Scorecard, Verdict, VerdictInputs, VerdictLabel};
