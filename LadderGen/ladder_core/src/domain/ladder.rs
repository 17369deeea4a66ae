//! 梯形图生成模块：指令行（Ladder Row）代数。
//!
//! 这里只负责“记法”，不做任何决策：
//! - 每个构造函数生成一行（或几行）指令
//! - 软元件字符串格式固定：位 / 字为 `<Label><Integer>`，常数为 `K<Integer>`
//! - 该格式会被 PLC 导入直接消费，不得改动

use serde::{Deserialize, Serialize};

/// 定时器软元件标签。
pub const TIMER_LABEL: &str = "T";

/// 指令助记符。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Ld,
    Ldi,
    And,
    Ani,
    Or,
    Ori,
    Anb,
    Orb,
    Out,
    Set,
    Rst,
    Pls,
    Mov,
    Inc,
    Sub,
    Cj,
    Comment,
}

impl Command {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Command::Ld => "LD",
            Command::Ldi => "LDI",
            Command::And => "AND",
            Command::Ani => "ANI",
            Command::Or => "OR",
            Command::Ori => "ORI",
            Command::Anb => "ANB",
            Command::Orb => "ORB",
            Command::Out => "OUT",
            Command::Set => "SET",
            Command::Rst => "RST",
            Command::Pls => "PLS",
            Command::Mov => "MOV",
            Command::Inc => "INC",
            Command::Sub => "-",
            Command::Cj => "CJ",
            Command::Comment => "",
        }
    }

    /// 是否开始一个新的接点组（LD / LDI）。
    pub fn is_load(self) -> bool {
        matches!(self, Command::Ld | Command::Ldi)
    }
}

/// 一行指令：操作码 + 0~3 个操作数。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderRow {
    /// 行标识，在一次生成开始时从 0 重新计数（由 `LadderProgram` 分配）
    #[serde(default)]
    pub id: u32,
    pub command: Command,
    #[serde(default)]
    pub operands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LadderRow {
    fn new(command: Command, operands: Vec<String>) -> Self {
        Self {
            id: 0,
            command,
            operands,
            note: None,
        }
    }

    pub fn ld(device: impl Into<String>) -> Self {
        Self::new(Command::Ld, vec![device.into()])
    }

    pub fn ldi(device: impl Into<String>) -> Self {
        Self::new(Command::Ldi, vec![device.into()])
    }

    pub fn and(device: impl Into<String>) -> Self {
        Self::new(Command::And, vec![device.into()])
    }

    pub fn ani(device: impl Into<String>) -> Self {
        Self::new(Command::Ani, vec![device.into()])
    }

    pub fn or(device: impl Into<String>) -> Self {
        Self::new(Command::Or, vec![device.into()])
    }

    pub fn ori(device: impl Into<String>) -> Self {
        Self::new(Command::Ori, vec![device.into()])
    }

    pub fn anb() -> Self {
        Self::new(Command::Anb, Vec::new())
    }

    pub fn orb() -> Self {
        Self::new(Command::Orb, Vec::new())
    }

    pub fn out(device: impl Into<String>) -> Self {
        Self::new(Command::Out, vec![device.into()])
    }

    /// 定时器线圈：`OUT T<n> K<preset>`。
    pub fn out_timer(timer: impl Into<String>, preset: impl Into<String>) -> Self {
        Self::new(Command::Out, vec![timer.into(), preset.into()])
    }

    pub fn set(device: impl Into<String>) -> Self {
        Self::new(Command::Set, vec![device.into()])
    }

    pub fn rst(device: impl Into<String>) -> Self {
        Self::new(Command::Rst, vec![device.into()])
    }

    pub fn pls(device: impl Into<String>) -> Self {
        Self::new(Command::Pls, vec![device.into()])
    }

    pub fn mov(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self::new(Command::Mov, vec![source.into(), dest.into()])
    }

    pub fn inc(device: impl Into<String>) -> Self {
        Self::new(Command::Inc, vec![device.into()])
    }

    /// 减法：`- s1 s2 d`。
    pub fn sub(minuend: impl Into<String>, subtrahend: impl Into<String>, dest: impl Into<String>) -> Self {
        Self::new(Command::Sub, vec![minuend.into(), subtrahend.into(), dest.into()])
    }

    pub fn cj(pointer: impl Into<String>) -> Self {
        Self::new(Command::Cj, vec![pointer.into()])
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            note: Some(text.into()),
            ..Self::new(Command::Comment, Vec::new())
        }
    }
}

/// 常数：`K<value>`。
pub fn k(value: i64) -> String {
    format!("K{value}")
}

/// 定时器软元件：`T<num>`。
pub fn timer_device(num: u32) -> String {
    format!("{TIMER_LABEL}{num}")
}

/// 拆分软元件字符串为 (标签, 编号)，例如 `M1005` -> (`M`, 1005)。
pub fn split_device(device: &str) -> Option<(&str, u32)> {
    let digits_at = device.find(|c: char| c.is_ascii_digit())?;
    let (label, number) = device.split_at(digits_at);
    if label.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((label, number.parse().ok()?))
}

/// 同一标签下偏移后的软元件（字软元件 D100 + 1 = D101）。
pub fn offset_device(device: &str, by: u32) -> Option<String> {
    let (label, number) = split_device(device)?;
    Some(format!("{label}{}", number.checked_add(by)?))
}

/// `T` 开头且后续全为数字：定时器接点引用，不走 IO 解析。
pub fn is_timer_reference(name: &str) -> bool {
    name.strip_prefix(TIMER_LABEL)
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// 接点：软元件 + 是否常闭。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub device: String,
    pub negated: bool,
}

impl Contact {
    pub fn no(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            negated: false,
        }
    }

    pub fn nc(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            negated: true,
        }
    }

    pub fn load(&self) -> LadderRow {
        if self.negated {
            LadderRow::ldi(&self.device)
        } else {
            LadderRow::ld(&self.device)
        }
    }

    pub fn and(&self) -> LadderRow {
        if self.negated {
            LadderRow::ani(&self.device)
        } else {
            LadderRow::and(&self.device)
        }
    }

    pub fn or(&self) -> LadderRow {
        if self.negated {
            LadderRow::ori(&self.device)
        } else {
            LadderRow::or(&self.device)
        }
    }
}

/// AND 链：首个接点 LD/LDI，其余 AND/ANI。
pub fn and_chain(contacts: &[Contact]) -> Vec<LadderRow> {
    let mut rows = Vec::with_capacity(contacts.len());
    for (index, contact) in contacts.iter().enumerate() {
        if index == 0 {
            rows.push(contact.load());
        } else {
            rows.push(contact.and());
        }
    }
    rows
}

/// “AND 链的 OR”：每个分支一组 LD/AND，从第二个分支起每组后面恰好一个 ORB。
///
/// 空分支会被忽略；N 个非空分支 -> N 组 + (N-1) 个 ORB。
pub fn or_of_and_chains(branches: &[Vec<Contact>]) -> Vec<LadderRow> {
    let mut rows = Vec::new();
    let mut emitted = 0usize;
    for branch in branches.iter().filter(|branch| !branch.is_empty()) {
        rows.extend(and_chain(branch));
        if emitted > 0 {
            rows.push(LadderRow::orb());
        }
        emitted += 1;
    }
    rows
}
