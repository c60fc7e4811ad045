#[cfg(feature = "cli")]
use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Resource usage captured at the end of one pipeline phase.
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub phase_time: Duration,
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    pid: Pid,
    peak_memory_mb: u64,
    last_mark: Instant,
    phases: Vec<PhaseStats>,
}

/// Process CPU/memory monitor; a disabled monitor records nothing.
pub struct SystemMonitor {
    #[cfg(feature = "cli")]
    state: Option<Mutex<MonitorState>>,
    start_time: Instant,
}

impl SystemMonitor {
    #[cfg(feature = "cli")]
    pub fn new(enabled: bool) -> Self {
        let state = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => {
                    let mut system = System::new();
                    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                    Some(Mutex::new(MonitorState {
                        system,
                        pid,
                        peak_memory_mb: 0,
                        last_mark: Instant::now(),
                        phases: Vec::new(),
                    }))
                }
                Err(e) => {
                    tracing::warn!("⚠️ System monitoring unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            state,
            start_time: Instant::now(),
        }
    }

    #[cfg(not(feature = "cli"))]
    pub fn new(_enabled: bool) -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "cli")]
        {
            self.state.is_some()
        }
        #[cfg(not(feature = "cli"))]
        {
            false
        }
    }

    /// Records the phase that just finished and logs it.
    pub fn mark_phase(&self, phase: &str) -> Option<PhaseStats> {
        #[cfg(feature = "cli")]
        {
            let mut state = self.state.as_ref()?.lock().ok()?;
            let pid = state.pid;
            state
                .system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

            let (cpu_usage, memory_mb) = {
                let process = state.system.process(pid)?;
                (process.cpu_usage(), process.memory() / 1024 / 1024)
            };
            state.peak_memory_mb = state.peak_memory_mb.max(memory_mb);

            let stats = PhaseStats {
                phase: phase.to_string(),
                phase_time: state.last_mark.elapsed(),
                cpu_usage,
                memory_mb,
                peak_memory_mb: state.peak_memory_mb,
            };
            state.last_mark = Instant::now();
            state.phases.push(stats.clone());

            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Phase time: {:?}",
                stats.phase,
                stats.cpu_usage,
                stats.memory_mb,
                stats.peak_memory_mb,
                stats.phase_time
            );
            Some(stats)
        }
        #[cfg(not(feature = "cli"))]
        {
            let _ = phase;
            None
        }
    }

    pub fn phases(&self) -> Vec<PhaseStats> {
        #[cfg(feature = "cli")]
        {
            self.state
                .as_ref()
                .and_then(|s| s.lock().ok().map(|s| s.phases.clone()))
                .unwrap_or_default()
        }
        #[cfg(not(feature = "cli"))]
        {
            Vec::new()
        }
    }

    pub fn log_final_stats(&self) {
        if !self.is_enabled() {
            return;
        }
        let peak = self
            .phases()
            .iter()
            .map(|p| p.peak_memory_mb)
            .max()
            .unwrap_or(0);
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
            self.start_time.elapsed(),
            peak
        );
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
