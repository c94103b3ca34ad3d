//! Compute unit pool for the local renderer.
//!
//! Each unit is one accelerator identified by its ordinal. Work is steered to
//! a unit by passing an [`ExecutionContext`] into the work function; the
//! context is applied to each child process's own environment, so nothing in
//! the parent process is toggled while units run side by side.

use std::future::Future;
use std::ops::Range;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{Mutex, MutexGuard};

/// Device targeting for one piece of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    unit: Option<usize>,
    device_env: String,
}

impl ExecutionContext {
    /// Context pinned to a single unit.
    pub fn pinned(unit: usize, device_env: &str) -> Self {
        Self {
            unit: Some(unit),
            device_env: device_env.to_string(),
        }
    }

    /// Context that leaves device selection to the child's inherited environment.
    pub fn inherit(device_env: &str) -> Self {
        Self {
            unit: None,
            device_env: device_env.to_string(),
        }
    }

    pub fn unit(&self) -> Option<usize> {
        self.unit
    }

    /// Apply the targeting to a command about to be spawned.
    pub fn apply(&self, cmd: &mut Command) {
        if let Some(unit) = self.unit {
            cmd.env(&self.device_env, unit.to_string());
        }
    }
}

/// Per-unit slot state. Only touched while the slot's lock is held.
#[derive(Debug, Default)]
struct UnitSlot {
    bound: Option<ExecutionContext>,
    leases: u64,
}

/// Exclusive hold on one unit; restores the slot's prior binding on drop.
///
/// Drop runs on every exit path of the scoped work, including panics and a
/// cancelled (dropped) future.
struct UnitLease<'a> {
    slot: MutexGuard<'a, UnitSlot>,
    previous: Option<ExecutionContext>,
}

impl<'a> UnitLease<'a> {
    fn bind(mut slot: MutexGuard<'a, UnitSlot>, context: ExecutionContext) -> Self {
        let previous = slot.bound.replace(context);
        slot.leases += 1;
        Self { slot, previous }
    }
}

impl Drop for UnitLease<'_> {
    fn drop(&mut self) {
        self.slot.bound = self.previous.take();
    }
}

/// Fixed set of local compute units, probed once at startup.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    slots: Arc<Vec<Mutex<UnitSlot>>>,
    device_env: String,
}

impl ResourcePool {
    /// Create a pool with a known number of units.
    pub fn new(units: usize, device_env: &str) -> Self {
        let slots = (0..units).map(|_| Mutex::new(UnitSlot::default())).collect();
        Self {
            slots: Arc::new(slots),
            device_env: device_env.to_string(),
        }
    }

    /// Create a pool from a config override, or by counting visible GPUs.
    pub async fn probe(override_units: Option<usize>, device_env: &str) -> Self {
        let units = match override_units {
            Some(units) => {
                tracing::debug!("Using configured unit count: {units}");
                units
            }
            None => detect_gpus().await,
        };
        Self::new(units, device_env)
    }

    /// Number of compute units (0 when none were discovered).
    pub fn unit_count(&self) -> usize {
        self.slots.len()
    }

    pub fn device_env(&self) -> &str {
        &self.device_env
    }

    /// Context used when work is not pinned to any unit.
    pub fn default_context(&self) -> ExecutionContext {
        ExecutionContext::inherit(&self.device_env)
    }

    /// Run `work` with exclusive use of unit `index`.
    ///
    /// The slot is bound to `index` for the duration of `work` and restored
    /// to its previous binding afterwards. Returns `None` if `index` is out
    /// of range.
    pub async fn with_unit<F, Fut, T>(&self, index: usize, work: F) -> Option<T>
    where
        F: FnOnce(ExecutionContext) -> Fut,
        Fut: Future<Output = T>,
    {
        let slot = self.slots.get(index)?;
        let context = ExecutionContext::pinned(index, &self.device_env);
        let lease = UnitLease::bind(slot.lock().await, context.clone());
        tracing::trace!("Unit {index} acquired (lease {})", lease.slot.leases);
        let out = work(context).await;
        drop(lease);
        Some(out)
    }

    /// Context currently bound to unit `index` (None when idle or out of range).
    #[cfg(test)]
    pub(crate) async fn bound_context(&self, index: usize) -> Option<ExecutionContext> {
        let slot = self.slots.get(index)?;
        slot.lock().await.bound.clone()
    }

    /// How many times unit `index` has been leased.
    #[cfg(test)]
    pub(crate) async fn lease_count(&self, index: usize) -> u64 {
        match self.slots.get(index) {
            Some(slot) => slot.lock().await.leases,
            None => 0,
        }
    }
}

/// Split `n` items into `units` contiguous ranges, sizes differing by at most one.
///
/// The first `n % units` ranges get the extra item. Returns an empty vec when
/// `units` is 0.
pub fn partition(n: usize, units: usize) -> Vec<Range<usize>> {
    if units == 0 {
        return Vec::new();
    }
    let base = n / units;
    let extra = n % units;
    let mut start = 0;
    (0..units)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Count GPUs via `nvidia-smi --list-gpus`. Any failure counts as zero.
async fn detect_gpus() -> usize {
    let output = Command::new("nvidia-smi")
        .arg("--list-gpus")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(Duration::from_secs(5), output).await {
        Ok(Ok(out)) if out.status.success() => {
            let count = count_gpu_lines(&String::from_utf8_lossy(&out.stdout));
            tracing::debug!("nvidia-smi reported {count} GPU(s)");
            count
        }
        Ok(Ok(out)) => {
            tracing::debug!("nvidia-smi exited with {}", out.status);
            0
        }
        Ok(Err(e)) => {
            tracing::debug!("nvidia-smi not runnable: {e}");
            0
        }
        Err(_) => {
            tracing::warn!("nvidia-smi timed out after 5s, assuming no GPUs");
            0
        }
    }
}

fn count_gpu_lines(stdout: &str) -> usize {
    stdout.lines().filter(|l| !l.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_partition_even() {
        assert_eq!(partition(4, 2), vec![0..2, 2..4]);
    }

    #[test]
    fn test_partition_remainder_goes_first() {
        assert_eq!(partition(7, 3), vec![0..3, 3..5, 5..7]);
    }

    #[test]
    fn test_partition_fewer_items_than_units() {
        assert_eq!(partition(2, 4), vec![0..1, 1..2, 2..2, 2..2]);
    }

    #[test]
    fn test_partition_zero_units() {
        assert!(partition(5, 0).is_empty());
    }

    #[test]
    fn test_partition_sizes_and_order_property() {
        for n in 0..40 {
            for units in 1..9 {
                let ranges = partition(n, units);
                assert_eq!(ranges.len(), units);

                let (lo, hi) = (n / units, n.div_ceil(units));
                for (i, r) in ranges.iter().enumerate() {
                    let expected = if i < n % units { hi } else { lo };
                    assert_eq!(r.len(), expected, "n={n} units={units} group={i}");
                }

                let flattened: Vec<usize> = ranges.into_iter().flatten().collect();
                assert_eq!(flattened, (0..n).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_count_gpu_lines() {
        let out = "GPU 0: NVIDIA A100 (UUID: GPU-1)\nGPU 1: NVIDIA A100 (UUID: GPU-2)\n\n";
        assert_eq!(count_gpu_lines(out), 2);
        assert_eq!(count_gpu_lines(""), 0);
    }

    #[tokio::test]
    async fn test_probe_uses_override() {
        let pool = ResourcePool::probe(Some(3), "CUDA_VISIBLE_DEVICES").await;
        assert_eq!(pool.unit_count(), 3);
    }

    #[tokio::test]
    async fn test_with_unit_binds_then_restores() {
        let pool = ResourcePool::new(2, "CUDA_VISIBLE_DEVICES");
        let inner = pool.clone();

        let seen = pool
            .with_unit(1, |ctx| async move {
                assert_eq!(ctx.unit(), Some(1));
                // The slot lock is held, so peek at the state via try_lock.
                let bound = inner.slots[1].try_lock().map(|s| s.bound.clone());
                assert!(bound.is_err(), "slot must be locked while work runs");
                ctx
            })
            .await
            .unwrap();

        assert_eq!(seen, ExecutionContext::pinned(1, "CUDA_VISIBLE_DEVICES"));
        assert!(pool.bound_context(1).await.is_none());
        assert_eq!(pool.lease_count(1).await, 1);
        assert_eq!(pool.lease_count(0).await, 0);
    }

    #[tokio::test]
    async fn test_with_unit_out_of_range() {
        let pool = ResourcePool::new(1, "CUDA_VISIBLE_DEVICES");
        let ran = AtomicBool::new(false);
        let out = pool
            .with_unit(5, |_| async {
                ran.store(true, Ordering::SeqCst);
            })
            .await;
        assert!(out.is_none());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_restore_after_error_result() {
        let pool = ResourcePool::new(1, "CUDA_VISIBLE_DEVICES");
        let out: Option<Result<(), String>> = pool
            .with_unit(0, |_| async { Err("device lost".to_string()) })
            .await;
        assert_eq!(out, Some(Err("device lost".to_string())));
        assert!(pool.bound_context(0).await.is_none());
    }

    #[tokio::test]
    async fn test_restore_after_cancellation() {
        let pool = ResourcePool::new(1, "CUDA_VISIBLE_DEVICES");

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            pool.with_unit(0, |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }),
        )
        .await;
        assert!(cancelled.is_err());

        assert!(pool.bound_context(0).await.is_none());
        // Slot is free again for the next unit of work.
        let again = pool.with_unit(0, |ctx| async move { ctx.unit() }).await;
        assert_eq!(again, Some(Some(0)));
    }

    #[tokio::test]
    async fn test_restore_after_panic() {
        use futures_util::FutureExt;
        use std::panic::AssertUnwindSafe;

        let pool = ResourcePool::new(1, "CUDA_VISIBLE_DEVICES");
        let caught = AssertUnwindSafe(pool.with_unit(0, |_| async {
            panic!("renderer crashed");
        }))
        .catch_unwind()
        .await;
        assert!(caught.is_err());
        assert!(pool.bound_context(0).await.is_none());
    }

    #[tokio::test]
    async fn test_units_run_concurrently_with_own_context() {
        let pool = ResourcePool::new(2, "CUDA_VISIBLE_DEVICES");
        let (a, b) = tokio::join!(
            pool.with_unit(0, |ctx| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ctx.unit()
            }),
            pool.with_unit(1, |ctx| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                ctx.unit()
            }),
        );
        assert_eq!(a, Some(Some(0)));
        assert_eq!(b, Some(Some(1)));
    }

    #[test]
    fn test_context_apply_sets_child_env_only() {
        let mut cmd = Command::new("true");
        ExecutionContext::pinned(3, "CUDA_VISIBLE_DEVICES").apply(&mut cmd);
        let envs: Vec<_> = cmd.as_std().get_envs().collect();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].0, "CUDA_VISIBLE_DEVICES");
        assert_eq!(envs[0].1.and_then(|v| v.to_str()), Some("3"));

        let mut plain = Command::new("true");
        ExecutionContext::inherit("CUDA_VISIBLE_DEVICES").apply(&mut plain);
        assert_eq!(plain.as_std().get_envs().count(), 0);
    }
}
