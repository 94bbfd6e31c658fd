//! Test harness
//!
//! Seeded board simulation and a multi-seed certification run over it.

pub mod simulator;

pub use simulator::{
    run_simulator, SimulatedOperation, SimulatorConfig, SimulatorReport, SimulatorStats, Violation,
};

use ticketboard_model::BoardError;

/// Run the simulator once per seed
///
/// # Errors
/// - `BoardError` if a simulated board cannot be opened or flushed
pub async fn run_certification(
    seeds: impl IntoIterator<Item = u64>,
    operations: u64,
    fault_rate: f64,
) -> Result<CertificationReport, BoardError> {
    let mut report = CertificationReport::default();

    for seed in seeds {
        let run = run_simulator(SimulatorConfig {
            seed,
            operations,
            fault_rate,
            stop_on_first_violation: true,
        })
        .await?;

        report.seeds_tested += 1;
        report.total_violations += run.violations.len();
        if !run.passed() {
            tracing::warn!(seed, "simulation failed");
            report.failed_seeds.push(seed);
        }
    }

    Ok(report)
}

/// Report from certification
#[derive(Debug, Clone, Default)]
pub struct CertificationReport {
    /// Seeds run
    pub seeds_tested: u64,
    /// Violations summed over every seed
    pub total_violations: usize,
    /// Seeds that reported at least one violation
    pub failed_seeds: Vec<u64>,
}

impl CertificationReport {
    /// Every seed passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failed_seeds.is_empty()
    }
}
