//! 快照索引：一次生成内的只读查找表，所有列表按显式排序键排序。

use std::collections::HashMap;

use crate::domain::model::{
    Cylinder, ManualControl, MnemonicDevice, MnemonicType, Operation, Process, ProcessDetail,
    ProjectSnapshot, SpeedDevice, Timer, TimerCategory,
};

/// 定时器查找结果：每个所属记录每个类别至多一个。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerLookup<'a> {
    Missing,
    Found(&'a Timer),
    Duplicate(usize),
}

pub struct SnapshotIndex<'a> {
    snapshot: &'a ProjectSnapshot,
    mnemonics: HashMap<(MnemonicType, i32), &'a MnemonicDevice>,
    cylinders: HashMap<i32, &'a Cylinder>,
    operations: HashMap<i32, &'a Operation>,
    details: HashMap<i32, &'a ProcessDetail>,
}

impl<'a> SnapshotIndex<'a> {
    pub fn new(snapshot: &'a ProjectSnapshot) -> Self {
        let mut mnemonics = HashMap::new();
        for device in &snapshot.mnemonics {
            // 重复分配以第一条为准
            mnemonics
                .entry((device.mnemonic_type, device.record_id))
                .or_insert(device);
        }
        Self {
            snapshot,
            mnemonics,
            cylinders: snapshot.cylinders.iter().map(|c| (c.id, c)).collect(),
            operations: snapshot.operations.iter().map(|o| (o.id, o)).collect(),
            details: snapshot.process_details.iter().map(|d| (d.id, d)).collect(),
        }
    }

    pub fn snapshot(&self) -> &'a ProjectSnapshot {
        self.snapshot
    }

    pub fn allocation(&self, mnemonic_type: MnemonicType, record_id: i32) -> Option<&'a MnemonicDevice> {
        self.mnemonics.get(&(mnemonic_type, record_id)).copied()
    }

    pub fn cylinder(&self, id: i32) -> Option<&'a Cylinder> {
        self.cylinders.get(&id).copied()
    }

    pub fn operation(&self, id: i32) -> Option<&'a Operation> {
        self.operations.get(&id).copied()
    }

    pub fn detail(&self, id: i32) -> Option<&'a ProcessDetail> {
        self.details.get(&id).copied()
    }

    pub fn sorted_cylinders(&self) -> Vec<&'a Cylinder> {
        let mut out: Vec<&Cylinder> = self.snapshot.cylinders.iter().collect();
        out.sort_by_key(|c| (c.sort_number, c.id));
        out
    }

    pub fn sorted_operations(&self) -> Vec<&'a Operation> {
        let mut out: Vec<&Operation> = self.snapshot.operations.iter().collect();
        out.sort_by_key(|o| (o.sort_number, o.id));
        out
    }

    pub fn sorted_processes(&self) -> Vec<&'a Process> {
        let mut out: Vec<&Process> = self.snapshot.processes.iter().collect();
        out.sort_by_key(|p| (p.sort_number, p.id));
        out
    }

    pub fn operations_of(&self, cylinder_id: i32) -> Vec<&'a Operation> {
        let mut out: Vec<&Operation> = self
            .snapshot
            .operations
            .iter()
            .filter(|o| o.cylinder_id == cylinder_id)
            .collect();
        out.sort_by_key(|o| (o.sort_number, o.id));
        out
    }

    pub fn details_of_operation(&self, operation_id: i32) -> Vec<&'a ProcessDetail> {
        let mut out: Vec<&ProcessDetail> = self
            .snapshot
            .process_details
            .iter()
            .filter(|d| d.operation_id == Some(operation_id))
            .collect();
        out.sort_by_key(|d| (d.sort_number, d.id));
        out
    }

    pub fn details_of_process(&self, process_id: i32) -> Vec<&'a ProcessDetail> {
        let mut out: Vec<&ProcessDetail> = self
            .snapshot
            .process_details
            .iter()
            .filter(|d| d.process_id == process_id)
            .collect();
        out.sort_by_key(|d| (d.sort_number, d.id));
        out
    }

    /// 所属工程不在快照中的明细，按 (sortNumber, id) 排序。
    pub fn orphan_details(&self) -> Vec<&'a ProcessDetail> {
        let mut out: Vec<&ProcessDetail> = self
            .snapshot
            .process_details
            .iter()
            .filter(|d| !self.has_process(d.process_id))
            .collect();
        out.sort_by_key(|d| (d.sort_number, d.id));
        out
    }

    pub fn has_process(&self, process_id: i32) -> bool {
        self.snapshot.processes.iter().any(|p| p.id == process_id)
    }

    pub fn timer(&self, owner_type: MnemonicType, record_id: i32, category: TimerCategory) -> TimerLookup<'a> {
        let mut matches = self
            .snapshot
            .timers
            .iter()
            .filter(|t| t.category_id == category.id() && t.owned_by(owner_type, record_id));
        match (matches.next(), matches.count()) {
            (None, _) => TimerLookup::Missing,
            (Some(timer), 0) => TimerLookup::Found(timer),
            (Some(_), rest) => TimerLookup::Duplicate(rest + 1),
        }
    }

    pub fn speed_device(&self, cylinder_id: i32) -> Option<&'a SpeedDevice> {
        self.snapshot
            .speed_devices
            .iter()
            .find(|s| s.cylinder_id == cylinder_id && !s.device.trim().is_empty())
    }

    pub fn manual_control(&self, cylinder_id: i32) -> Option<&'a ManualControl> {
        self.snapshot
            .manual_controls
            .iter()
            .find(|m| m.cylinder_id == cylinder_id)
    }
}
