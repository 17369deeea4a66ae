use ladder_core::adapters::csv_export::{render_csv, ExportError};
use ladder_core::application::conformance::check_offsets;
use ladder_core::domain::ladder::{or_of_and_chains, Command, Contact};
use ladder_core::domain::model::{
    Cylinder, Io, MnemonicDevice, MnemonicType, Operation, Process, ProcessDetail, ProjectSnapshot,
    SpeedDevice, Timer, TimerCategory,
};
use ladder_core::domain::roles::{CYLINDER_DISPATCH, OPERATION_DISPATCH};
use ladder_core::synth::cylinder::resolve_manual;
use ladder_core::{GenerationOutput, GenerationSettings, LadderRow, LadderService, SectionKind};

fn alloc(mnemonic_type: MnemonicType, record_id: i32, start_num: u32, count: u32) -> MnemonicDevice {
    MnemonicDevice {
        mnemonic_type,
        record_id,
        label: "M".to_string(),
        start_num,
        out_coil_count: count,
    }
}

fn output(name: &str, address: &str) -> Io {
    Io {
        id: 0,
        name: name.to_string(),
        address: address.to_string(),
        link_device: None,
        is_output: true,
        scope: "CY1".to_string(),
    }
}

fn input(name: &str, address: &str) -> Io {
    Io {
        is_output: false,
        ..output(name, address)
    }
}

/// 单电控、只有一个去动作的驱动单元。
fn single_valve_snapshot() -> ProjectSnapshot {
    ProjectSnapshot {
        plc_id: 1,
        cycle_id: 1,
        cylinders: vec![Cylinder {
            id: 1,
            cy_num: "CY1".to_string(),
            name: "clamp".to_string(),
            drive_sub_id: 1,
            sort_number: 1,
            multi_sensor_count: None,
        }],
        operations: vec![Operation {
            id: 10,
            name: "clamp go".to_string(),
            cylinder_id: 1,
            category_id: 1,
            go_back: Some("G".to_string()),
            start: Some("SW1".to_string()),
            finish: Some("SW2".to_string()),
            sort_number: 1,
            ..Default::default()
        }],
        processes: vec![Process {
            id: 5,
            name: "load".to_string(),
            category_id: 1,
            sort_number: 1,
            block_number: Some(1),
        }],
        process_details: vec![ProcessDetail {
            id: 50,
            name: "clamp".to_string(),
            process_id: 5,
            operation_id: Some(10),
            sort_number: 1,
        }],
        ios: vec![
            input("SW1", "X0"),
            input("SW2", "X1"),
            output("G", "Y10"),
        ],
        mnemonics: vec![
            alloc(MnemonicType::Operation, 10, 1000, 20),
            alloc(MnemonicType::Cylinder, 1, 2000, 16),
            alloc(MnemonicType::Process, 5, 3000, 3),
            alloc(MnemonicType::ProcessDetail, 50, 3100, 3),
        ],
        manual_controls: vec![ladder_core::domain::model::ManualControl {
            cylinder_id: 1,
            go: "X100".to_string(),
            back: "X101".to_string(),
            enable: "M600".to_string(),
        }],
        ..Default::default()
    }
}

fn generate(snapshot: &ProjectSnapshot) -> GenerationOutput {
    LadderService::from_snapshot(snapshot, GenerationSettings::default())
        .unwrap()
        .generate(snapshot)
}

fn section_rows(output: &GenerationOutput, kind: SectionKind) -> Vec<LadderRow> {
    output.program.section(kind).map(|s| s.rows.clone()).unwrap_or_default()
}

/// 块内偏移集合（只看 `M<start..start+count>` 范围内的操作数）。
fn offsets_in(rows: &[LadderRow], start: u32, count: u32) -> Vec<u32> {
    let mut offsets: Vec<u32> = rows
        .iter()
        .flat_map(|row| row.operands.iter())
        .filter_map(|operand| operand.strip_prefix('M')?.parse::<u32>().ok())
        .filter(|n| (start..start + count).contains(n))
        .map(|n| n - start)
        .collect();
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

fn outs(rows: &[LadderRow]) -> Vec<String> {
    rows.iter()
        .filter(|row| row.command == Command::Out)
        .filter_map(|row| row.operands.first().cloned())
        .filter(|operand| operand.starts_with('Y'))
        .collect()
}

#[test]
fn single_valve_go_only_actuator() {
    let snapshot = single_valve_snapshot();
    let output = generate(&snapshot);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let operation = section_rows(&output, SectionKind::Operation);
    assert_eq!(offsets_in(&operation, 1000, 20), vec![0, 2, 5, 6, 7, 16, 17, 19]);

    let cylinder = section_rows(&output, SectionKind::Cylinder);
    // 自动去：单分支，没有 ORB
    assert_eq!(cylinder[1], LadderRow { id: cylinder[1].id, ..LadderRow::ld("M1005") });
    assert_eq!(cylinder[2].operands, vec!["M2000"]);
    let last = cylinder.last().unwrap();
    assert_eq!(last.command, Command::Out);
    assert_eq!(outs(&cylinder), vec!["Y10"]);
}

#[test]
fn unresolved_single_valve_is_a_single_warning() {
    let mut snapshot = single_valve_snapshot();
    snapshot.ios.retain(|io| io.name != "G");
    let output = generate(&snapshot);

    assert!(outs(&section_rows(&output, SectionKind::Cylinder)).is_empty());
    assert_eq!(output.diagnostics.len(), 1);
    assert!(!output.diagnostics[0].is_critical);
    assert_eq!(output.diagnostics[0].mnemonic_type, MnemonicType::Cylinder);
    assert_eq!(output.diagnostics[0].record_id, 1);
    assert!(!output.has_critical());
}

#[test]
fn double_valve_with_two_sensor_suffixes() {
    let mut snapshot = single_valve_snapshot();
    snapshot.cylinders[0].drive_sub_id = 2;
    snapshot.cylinders[0].multi_sensor_count = Some(2);
    snapshot.ios.retain(|io| io.name != "G");
    snapshot.ios.extend([
        output("G1", "Y10"),
        output("G2", "Y11"),
        output("B1", "Y12"),
        output("B2", "Y13"),
    ]);

    let output_all = generate(&snapshot);
    assert!(output_all.diagnostics.is_empty(), "{:?}", output_all.diagnostics);
    let cylinder = section_rows(&output_all, SectionKind::Cylinder);
    let first = cylinder.iter().position(|r| r.operands == ["Y10"]).unwrap();
    assert_eq!(cylinder[first + 1].command, Command::Out);
    assert_eq!(cylinder[first + 1].operands, vec!["Y11"]);
    assert_eq!(cylinder[first - 1].command, Command::Ani);
    assert_eq!(cylinder[first - 1].operands, vec!["Y12"]);

    snapshot.ios.retain(|io| io.name != "G2");
    let output_one = generate(&snapshot);
    assert_eq!(output_one.diagnostics.len(), 1);
    assert!(output_one.diagnostics[0].message.contains("G2"));
    let go_outs: Vec<String> = outs(&section_rows(&output_one, SectionKind::Cylinder))
        .into_iter()
        .filter(|o| o == "Y10" || o == "Y11")
        .collect();
    assert_eq!(go_outs, vec!["Y10"]);
}

#[test]
fn generation_is_deterministic() {
    let mut snapshot = single_valve_snapshot();
    snapshot.timers.push(Timer {
        id: 1,
        name: "stable".to_string(),
        category_id: TimerCategory::Stable.id(),
        mnemonic_type: MnemonicType::Operation,
        record_ids: vec![10],
        timer_num: 3,
        preset: 10,
    });
    let first = generate(&snapshot);
    let second = generate(&snapshot);
    assert_eq!(first, second);
    assert_eq!(first.program.rows().next().map(|r| r.id), Some(0));
    assert_eq!(
        render_csv(first.program.rows()).unwrap(),
        render_csv(second.program.rows()).unwrap()
    );
}

#[test]
fn branch_composition_law() {
    for n in 1..=6 {
        let branches: Vec<Vec<Contact>> = (0..n)
            .map(|i| vec![Contact::no(format!("X{i}")), Contact::nc(format!("Y{i}"))])
            .collect();
        let rows = or_of_and_chains(&branches);
        let loads = rows.iter().filter(|r| r.command.is_load()).count();
        let orbs = rows.iter().filter(|r| r.command == Command::Orb).count();
        assert_eq!(loads, n);
        assert_eq!(orbs, n - 1);
    }
}

#[test]
fn every_reference_stays_inside_the_role_set() {
    let mut snapshot = single_valve_snapshot();
    snapshot.operations.push(Operation {
        id: 11,
        name: "clamp back".to_string(),
        cylinder_id: 1,
        category_id: 2,
        go_back: Some("B".to_string()),
        start: Some("SW2".to_string()),
        finish: Some("SW1".to_string()),
        sort_number: 2,
        ..Default::default()
    });
    snapshot.mnemonics.push(alloc(MnemonicType::Operation, 11, 1020, 20));
    snapshot.cylinders[0].drive_sub_id = 2;
    snapshot.ios.push(output("B", "Y11"));

    let output = generate(&snapshot);
    assert!(!output.has_critical(), "{:?}", output.diagnostics);
    assert!(check_offsets(&snapshot, &output.program).is_empty());
}

#[test]
fn manual_fallback_is_idempotent_per_actuator() {
    let snapshot = single_valve_snapshot();
    let settings = GenerationSettings::default();
    let cylinder = &snapshot.cylinders[0];
    let first = resolve_manual(cylinder, None, &settings);
    let second = resolve_manual(cylinder, None, &settings);
    assert_eq!(first, second);

    let mut without_mapping = snapshot.clone();
    without_mapping.manual_controls.clear();
    let output = generate(&without_mapping);
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].record_id, cylinder.id);
}

#[test]
fn critical_diagnostic_gates_export() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = single_valve_snapshot();
    let service = LadderService::from_snapshot(&snapshot, GenerationSettings::default()).unwrap();

    let output = service.generate(&snapshot);
    let outcome = service.export(&output, dir.path()).unwrap();
    assert_eq!(outcome.files.len(), 6);
    assert!(dir.path().join("ProcessDetail.csv").exists());

    let mut broken = snapshot.clone();
    broken.operations[0].finish = None;
    let blocked_dir = tempfile::tempdir().unwrap();
    let output = service.generate(&broken);
    assert!(output.has_critical());
    let err = service.export(&output, blocked_dir.path()).unwrap_err();
    assert!(matches!(err, ExportError::Blocked { critical: 1 }));
    assert_eq!(std::fs::read_dir(blocked_dir.path()).unwrap().count(), 0);
}

#[test]
fn process_sections_follow_operations_and_cylinders() {
    let output = generate(&single_valve_snapshot());
    let kinds: Vec<SectionKind> = output.program.sections.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SectionKind::Operation,
            SectionKind::Cylinder,
            SectionKind::Process,
            SectionKind::ProcessDetail
        ]
    );
    let process = section_rows(&output, SectionKind::Process);
    assert_eq!(process.last().map(|r| r.command), Some(Command::Cj));
    assert_eq!(process.last().unwrap().operands, vec!["P1"]);
}

fn timer(id: i32, category: TimerCategory, owner: MnemonicType, record_id: i32) -> Timer {
    Timer {
        id,
        name: format!("T{id}"),
        category_id: category.id(),
        mnemonic_type: owner,
        record_ids: vec![record_id],
        timer_num: id as u32,
        preset: 10,
    }
}

/// 所有可选资源都配齐的快照：给定驱动类别码和去动作类别码。
fn fully_configured(drive_sub_id: u32, category_id: u32) -> ProjectSnapshot {
    let mut snapshot = single_valve_snapshot();
    snapshot.cylinders[0].drive_sub_id = drive_sub_id;
    let go = &mut snapshot.operations[0];
    go.category_id = category_id;
    go.speed_sensors = (1..=4).map(|i| format!("S{i}")).collect();
    go.speeds = vec![10, 20, 30, 40];
    go.start_speed = Some(5);
    go.position = Some(1200);
    snapshot.operations.push(Operation {
        id: 11,
        name: "clamp back".to_string(),
        cylinder_id: 1,
        category_id: 1,
        go_back: Some("B".to_string()),
        start: Some("SW2".to_string()),
        finish: Some("SW1".to_string()),
        sort_number: 2,
        ..Default::default()
    });
    snapshot.mnemonics.push(alloc(MnemonicType::Operation, 11, 1020, 20));
    snapshot.ios.extend([
        output("B", "Y11"),
        output("PST", "Y12"),
        output("BRK", "Y13"),
        output("JOG+", "Y14"),
        output("JOG-", "Y15"),
    ]);
    snapshot
        .ios
        .extend((1..=4).map(|i| input(&format!("S{i}"), &format!("X{}", 10 + i))));
    snapshot.speed_devices.push(SpeedDevice {
        cylinder_id: 1,
        device: "D500".to_string(),
    });
    let categories = [
        TimerCategory::StartWait,
        TimerCategory::Stable,
        TimerCategory::DeepSeat,
        TimerCategory::SpeedChange1,
        TimerCategory::SpeedChange2,
        TimerCategory::SpeedChange3,
        TimerCategory::SpeedChange4,
    ];
    for (i, category) in categories.into_iter().enumerate() {
        snapshot
            .timers
            .push(timer(i as i32 + 1, category, MnemonicType::Operation, 10));
    }
    snapshot.timers.push(timer(
        20,
        TimerCategory::ForcedDeceleration,
        MnemonicType::Cylinder,
        1,
    ));
    snapshot
}

#[test]
fn every_dispatch_pair_stays_inside_its_role_sets() {
    for (drive_code, _) in CYLINDER_DISPATCH {
        for (operation_code, _) in OPERATION_DISPATCH {
            let snapshot = fully_configured(*drive_code, *operation_code);
            let output = generate(&snapshot);
            assert!(
                !output.has_critical(),
                "drive {drive_code} operation {operation_code}: {:?}",
                output.diagnostics
            );
            let violations = check_offsets(&snapshot, &output.program);
            assert!(
                violations.is_empty(),
                "drive {drive_code} operation {operation_code}: {violations:?}"
            );
        }
    }
}

#[test]
fn allocation_at_the_end_of_the_address_space_is_critical() {
    let mut snapshot = single_valve_snapshot();
    snapshot.mnemonics[0].start_num = u32::MAX - 5;
    let output = generate(&snapshot);
    let operation: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|d| d.mnemonic_type == MnemonicType::Operation)
        .collect();
    assert_eq!(operation.len(), 1);
    assert!(operation[0].is_critical);
    assert!(section_rows(&output, SectionKind::Operation).is_empty());
}

#[test]
fn detail_of_a_missing_process_blocks_export() {
    let mut snapshot = single_valve_snapshot();
    snapshot.processes.clear();
    let output = generate(&snapshot);
    assert!(output.has_critical());
    let detail: Vec<_> = output
        .diagnostics
        .iter()
        .filter(|d| d.mnemonic_type == MnemonicType::ProcessDetail)
        .collect();
    assert_eq!(detail.len(), 1);
    assert_eq!(detail[0].record_id, 50);
    assert!(detail[0].is_critical);
}

