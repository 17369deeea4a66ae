//! 内存 IO 表：`DeviceResolver` 的默认实现。
//!
//! 查找规则：
//! - 先在同名作用域（驱动单元显示编号）内匹配，找不到再退回公共 IO（空作用域）
//! - 多个候选交给 `IoSelector`；同一实体同一符号名的选择结果会被记住，只问一次

use std::collections::HashMap;

use log::debug;
use parking_lot::Mutex;

use crate::domain::model::Io;
use crate::ports::{DeviceResolver, IoSelector, SelectionRequest};

/// 默认选择：表中顺序的第一个候选。
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCandidate;

impl IoSelector for FirstCandidate {
    fn select<'c>(&self, _request: &SelectionRequest<'_>, candidates: &'c [Io]) -> Option<&'c Io> {
        candidates.first()
    }
}

/// 拒绝所有多候选选择（相当于人工取消）。
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineSelection;

impl IoSelector for DeclineSelection {
    fn select<'c>(&self, _request: &SelectionRequest<'_>, _candidates: &'c [Io]) -> Option<&'c Io> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChoiceKey {
    name: String,
    is_output: bool,
    scope_name: String,
    scope_record_id: i32,
}

pub struct IoTable {
    ios: Vec<Io>,
    selector: Box<dyn IoSelector + Send + Sync>,
    choices: Mutex<HashMap<ChoiceKey, Option<String>>>,
}

impl IoTable {
    pub fn new(ios: Vec<Io>) -> Self {
        Self::with_selector(ios, FirstCandidate)
    }

    pub fn with_selector(ios: Vec<Io>, selector: impl IoSelector + Send + Sync + 'static) -> Self {
        Self {
            ios,
            selector: Box::new(selector),
            choices: Mutex::new(HashMap::new()),
        }
    }

    /// 作用域内优先，其次公共 IO。
    fn scoped<'a>(&'a self, scope_name: &str, matches: impl Fn(&Io) -> bool) -> Vec<&'a Io> {
        let own: Vec<&Io> = self
            .ios
            .iter()
            .filter(|io| io.scope == scope_name && matches(io))
            .collect();
        if !own.is_empty() {
            return own;
        }
        self.ios
            .iter()
            .filter(|io| io.scope.trim().is_empty() && matches(io))
            .collect()
    }
}

fn numeric_suffix(name: &str, pattern: &str) -> Option<u32> {
    let rest = name.strip_prefix(pattern)?;
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

impl DeviceResolver for IoTable {
    fn resolve(
        &self,
        name: &str,
        is_output: bool,
        scope_name: &str,
        scope_record_id: i32,
    ) -> Option<String> {
        let candidates = self.scoped(scope_name, |io| io.name == name && io.is_output == is_output);
        match candidates.as_slice() {
            [] => None,
            [only] => Some(only.effective_address().to_string()),
            many => {
                let key = ChoiceKey {
                    name: name.to_string(),
                    is_output,
                    scope_name: scope_name.to_string(),
                    scope_record_id,
                };
                let mut choices = self.choices.lock();
                if let Some(choice) = choices.get(&key) {
                    return choice.clone();
                }

                let owned: Vec<Io> = many.iter().map(|io| (*io).clone()).collect();
                let request = SelectionRequest {
                    name,
                    is_output,
                    scope_name,
                    scope_record_id,
                };
                let choice = self
                    .selector
                    .select(&request, &owned)
                    .map(|io| io.effective_address().to_string());
                debug!(
                    "IO '{}' in scope '{}' has {} candidates, selected {:?}",
                    name,
                    scope_name,
                    owned.len(),
                    choice
                );
                choices.insert(key, choice.clone());
                choice
            }
        }
    }

    fn resolve_range(&self, pattern: &str, scope_name: &str, _scope_record_id: i32) -> Vec<Io> {
        let mut found: Vec<(u32, Io)> = self
            .scoped(scope_name, |io| numeric_suffix(&io.name, pattern).is_some())
            .into_iter()
            .filter_map(|io| numeric_suffix(&io.name, pattern).map(|n| (n, io.clone())))
            .collect();
        found.sort_by(|(a, io_a), (b, io_b)| a.cmp(b).then_with(|| io_a.id.cmp(&io_b.id)));
        found.into_iter().map(|(_, io)| io).collect()
    }
}
