//! Per-vehicle task chains.
//!
//! Jobs live in an arena addressed by [`JobId`]; a task stored in slot `s`
//! owns job `2s` (pickup) and `2s + 1` (delivery). A [`Schedule`] only holds
//! the chain heads and the `next` table, so cloning it copies two small
//! index vectors and bumps a reference count on the task list.

use std::sync::Arc;

use crate::error::{PlannerError, Result};
use crate::model::{Job, JobKind, LocationId, Task, TaskId, Vehicle};
use crate::traits::Geography;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(usize);

impl JobId {
    fn pickup(slot: usize) -> Self {
        JobId(slot * 2)
    }

    fn delivery(slot: usize) -> Self {
        JobId(slot * 2 + 1)
    }

    pub fn slot(self) -> usize {
        self.0 / 2
    }

    pub fn kind(self) -> JobKind {
        if self.0 % 2 == 0 {
            JobKind::Pickup
        } else {
            JobKind::Delivery
        }
    }

    pub fn is_pickup(self) -> bool {
        self.kind() == JobKind::Pickup
    }

    /// The other half of the same task.
    pub fn partner(self) -> JobId {
        JobId(self.0 ^ 1)
    }
}

/// Borrowed inputs every chain operation reads.
pub struct RoutingContext<'a, G: Geography + ?Sized> {
    pub geography: &'a G,
    pub fleet: &'a [Vehicle],
}

impl<G: Geography + ?Sized> Clone for RoutingContext<'_, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G: Geography + ?Sized> Copy for RoutingContext<'_, G> {}

impl<'a, G: Geography + ?Sized> RoutingContext<'a, G> {
    pub fn new(geography: &'a G, fleet: &'a [Vehicle]) -> Self {
        Self { geography, fleet }
    }
}

/// Rejects ids outside the geography.
pub fn check_location<G: Geography + ?Sized>(geography: &G, location: LocationId) -> Result<()> {
    if location.0 < geography.location_count() {
        Ok(())
    } else {
        Err(PlannerError::UnknownLocation(location))
    }
}

fn check_task<G: Geography + ?Sized>(geography: &G, task: &Task) -> Result<()> {
    check_location(geography, task.pickup)?;
    check_location(geography, task.delivery)
}

/// Every vehicle's chain at one point in time.
///
/// Treated as immutable by the search: operators clone, then edit the clone.
#[derive(Debug, Clone)]
pub struct Schedule {
    tasks: Arc<Vec<Task>>,
    heads: Vec<Option<JobId>>,
    next: Vec<Option<JobId>>,
}

impl Schedule {
    pub fn empty(vehicle_count: usize) -> Self {
        Self {
            tasks: Arc::new(Vec::new()),
            heads: vec![None; vehicle_count],
            next: Vec::new(),
        }
    }

    /// Fair initial assignment: `ceil(n / v)` consecutive tasks per vehicle,
    /// each appended as pickup then delivery. A task its chunk vehicle
    /// cannot carry is placed with [`Schedule::insert`] instead.
    pub fn round_robin<G: Geography + ?Sized>(
        ctx: RoutingContext<'_, G>,
        tasks: &[Task],
    ) -> Result<Self> {
        if ctx.fleet.is_empty() {
            return Err(PlannerError::EmptyFleet);
        }
        for task in tasks {
            check_task(ctx.geography, task)?;
        }

        let mut schedule = Self::empty(ctx.fleet.len());
        let per_vehicle = tasks.len().div_ceil(ctx.fleet.len()).max(1);
        let mut oversized = Vec::new();

        for (vehicle, chunk) in tasks.chunks(per_vehicle).enumerate() {
            let mut jobs = Vec::with_capacity(chunk.len() * 2);
            for task in chunk {
                if task.weight > ctx.fleet[vehicle].capacity {
                    oversized.push(task);
                    continue;
                }
                let slot = schedule.push_task(task.clone());
                jobs.push(JobId::pickup(slot));
                jobs.push(JobId::delivery(slot));
            }
            schedule.relink(vehicle, &jobs);
        }

        for task in oversized {
            schedule.insert_in_place(task, ctx)?;
        }

        Ok(schedule)
    }

    pub fn vehicle_count(&self) -> usize {
        self.heads.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn head(&self, vehicle: usize) -> Option<JobId> {
        self.heads[vehicle]
    }

    pub fn next(&self, job: JobId) -> Option<JobId> {
        self.next[job.0]
    }

    pub fn task_of(&self, job: JobId) -> &Task {
        &self.tasks[job.slot()]
    }

    pub fn job(&self, id: JobId) -> Job {
        let task = self.task_of(id);
        let (location, weight_delta) = match id.kind() {
            JobKind::Pickup => (task.pickup, i64::from(task.weight)),
            JobKind::Delivery => (task.delivery, -i64::from(task.weight)),
        };
        Job {
            task: task.id,
            kind: id.kind(),
            location,
            weight_delta,
        }
    }

    pub fn location(&self, id: JobId) -> LocationId {
        let task = self.task_of(id);
        match id.kind() {
            JobKind::Pickup => task.pickup,
            JobKind::Delivery => task.delivery,
        }
    }

    /// The vehicle's jobs in visiting order.
    pub fn chain(&self, vehicle: usize) -> Vec<JobId> {
        let mut jobs = Vec::new();
        let mut current = self.heads[vehicle];
        while let Some(job) = current {
            jobs.push(job);
            current = self.next[job.0];
        }
        jobs
    }

    pub fn vehicle_of(&self, task: TaskId) -> Option<usize> {
        (0..self.vehicle_count()).find(|&vehicle| {
            self.chain(vehicle)
                .iter()
                .any(|&job| self.task_of(job).id == task)
        })
    }

    /// Places the task on the nearest vehicle able to carry it, as the new
    /// head of that vehicle's chain. Returns the new schedule.
    pub fn insert<G: Geography + ?Sized>(
        &self,
        task: &Task,
        ctx: RoutingContext<'_, G>,
    ) -> Result<Schedule> {
        let mut schedule = self.clone();
        schedule.insert_in_place(task, ctx)?;
        Ok(schedule)
    }

    fn insert_in_place<G: Geography + ?Sized>(
        &mut self,
        task: &Task,
        ctx: RoutingContext<'_, G>,
    ) -> Result<()> {
        if ctx.fleet.is_empty() {
            return Err(PlannerError::EmptyFleet);
        }
        check_task(ctx.geography, task)?;

        let vehicle = ctx
            .fleet
            .iter()
            .enumerate()
            .filter(|(_, vehicle)| vehicle.capacity >= task.weight)
            .min_by(|(_, a), (_, b)| {
                let da = ctx.geography.distance(a.home, task.pickup);
                let db = ctx.geography.distance(b.home, task.pickup);
                da.total_cmp(&db)
            })
            .map(|(index, _)| index)
            .ok_or_else(|| PlannerError::InfeasibleTask {
                task: task.id,
                weight: task.weight,
                max_capacity: ctx.fleet.iter().map(|v| v.capacity).max().unwrap_or(0),
            })?;

        let slot = self.push_task(task.clone());
        self.prepend_pair(vehicle, slot);
        Ok(())
    }

    /// Total distance cost: home to first job, then job to job, each leg
    /// weighted by the owning vehicle's cost per km.
    pub fn cost<G: Geography + ?Sized>(&self, ctx: RoutingContext<'_, G>) -> f64 {
        self.heads
            .iter()
            .zip(ctx.fleet)
            .map(|(head, vehicle)| {
                let Some(first) = *head else {
                    return 0.0;
                };
                let mut distance = ctx.geography.distance(vehicle.home, self.location(first));
                let mut current = first;
                while let Some(next) = self.next[current.0] {
                    distance += ctx
                        .geography
                        .distance(self.location(current), self.location(next));
                    current = next;
                }
                distance * vehicle.cost_per_km
            })
            .sum()
    }

    /// Drops an idle vehicle's (empty) chain. Returns false if it has work
    /// or does not exist.
    pub fn remove_vehicle(&mut self, vehicle: usize) -> bool {
        if self.heads.get(vehicle).is_none_or(Option::is_some) {
            return false;
        }
        self.heads.remove(vehicle);
        true
    }

    fn push_task(&mut self, task: Task) -> usize {
        let tasks = Arc::make_mut(&mut self.tasks);
        tasks.push(task);
        self.next.push(None);
        self.next.push(None);
        tasks.len() - 1
    }

    /// Makes the task's pickup then delivery the first two jobs of `vehicle`.
    pub(crate) fn prepend_pair(&mut self, vehicle: usize, slot: usize) {
        let (pickup, delivery) = (JobId::pickup(slot), JobId::delivery(slot));
        self.next[pickup.0] = Some(delivery);
        self.next[delivery.0] = self.heads[vehicle];
        self.heads[vehicle] = Some(pickup);
    }

    /// Unlinks the vehicle's first pickup and its delivery, wherever that
    /// delivery sits. Returns the task slot.
    pub(crate) fn detach_first_pair(&mut self, vehicle: usize) -> Option<usize> {
        let pickup = self.heads[vehicle]?;
        let delivery = pickup.partner();

        if self.next[pickup.0] == Some(delivery) {
            self.heads[vehicle] = self.next[delivery.0];
        } else {
            self.heads[vehicle] = self.next[pickup.0];
            let mut previous = self.heads[vehicle]?;
            while self.next[previous.0] != Some(delivery) {
                previous = self.next[previous.0]?;
            }
            self.next[previous.0] = self.next[delivery.0];
        }

        self.next[pickup.0] = None;
        self.next[delivery.0] = None;
        Some(pickup.slot())
    }

    /// Relinks `vehicle` so it visits exactly `jobs`, in order.
    pub(crate) fn relink(&mut self, vehicle: usize, jobs: &[JobId]) {
        self.heads[vehicle] = jobs.first().copied();
        for pair in jobs.windows(2) {
            self.next[pair[0].0] = Some(pair[1]);
        }
        if let Some(last) = jobs.last() {
            self.next[last.0] = None;
        }
    }
}
