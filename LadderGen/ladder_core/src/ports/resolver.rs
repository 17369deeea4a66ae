use crate::domain::model::Io;

/// 软元件解析端口：符号名 + 作用域 -> 物理地址。
/// 说明：核心只依赖该接口；IO 表的存储与人工选择由上层实现。
pub trait DeviceResolver {
    /// 单点解析：唯一匹配返回地址；无匹配返回 `None`（由调用方记录诊断）；
    /// 多个匹配交给选择器，拒绝选择同样返回 `None`。
    fn resolve(
        &self,
        name: &str,
        is_output: bool,
        scope_name: &str,
        scope_record_id: i32,
    ) -> Option<String>;

    /// 多点解析：返回 `<pattern><数字>` 形式的全部候选，按后缀编号排序。
    fn resolve_range(&self, pattern: &str, scope_name: &str, scope_record_id: i32) -> Vec<Io>;
}

/// 一次多候选选择请求的上下文。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionRequest<'a> {
    pub name: &'a str,
    pub is_output: bool,
    pub scope_name: &'a str,
    pub scope_record_id: i32,
}

/// 多候选消歧端口（人工选择 UI 在上层实现）。
pub trait IoSelector {
    fn select<'c>(&self, request: &SelectionRequest<'_>, candidates: &'c [Io]) -> Option<&'c Io>;
}
