use std::sync::Arc;
use std::thread;

use lpm::error::LpmError;
use lpm::{
    BoundingBox, CameraViewParams, DetectionLabel, Engine, Image, ModuleConfig, Session, ViewType,
};
use lpm_mock::{Call, Journal};
use lpm_sys::*;

fn engine() -> Arc<Engine> {
    Engine::from_api(lpm_mock::api())
}

/// Opens a session over its own directory, so journals do not mix between tests.
fn open(directory: &str) -> (Session, Arc<Journal>) {
    let session = Session::init(engine(), directory).unwrap();
    let journal = lpm_mock::journal(directory).unwrap();
    (session, journal)
}

/// 100x50 black image with a white 40x15 plate at (20, 10).
fn plate_image() -> Image {
    let (width, height) = (100usize, 50usize);
    let mut data = vec![0u8; width * height * 3];
    for y in 10..25 {
        for x in 20..60 {
            let i = (y * width + x) * 3;
            data[i..i + 3].fill(255);
        }
    }
    Image::from_bgr(width as u32, height as u32, data).unwrap()
}

fn count(journal: &Journal, wanted: &Call) -> usize {
    journal.calls().iter().filter(|call| *call == wanted).count()
}

#[test]
fn engine_identity() {
    let engine = engine();
    assert_eq!(engine.version().to_string(), "7.6");
    assert_eq!(engine.compilation_date(), "Mar 14 2025");
    assert_eq!(
        engine.error_message(lpm_mock::ERR_MODULE_INDEX),
        "module index out of range"
    );
    assert!(engine.path().is_none());
}

#[test]
fn init_reports_engine_code() {
    let err = Session::init(engine(), "modules/missing").unwrap_err();
    assert!(matches!(err, LpmError::Init { code } if code == lpm_mock::ERR_DIRECTORY));
}

#[test]
fn close_is_idempotent() {
    let (session, journal) = open("modules/close-twice");
    assert!(!session.is_closed());

    session.close();
    session.close();
    drop(session);

    assert_eq!(count(&journal, &Call::Free { loaded: vec![] }), 1);
}

#[test]
fn closed_session_rejects_calls() {
    let (session, _journal) = open("modules/closed");
    session.close();
    assert!(session.is_closed());

    let image = plate_image();
    assert!(matches!(session.module_count(), Err(LpmError::InvalidState(_))));
    assert!(matches!(session.module_info(0), Err(LpmError::InvalidState(_))));
    assert!(matches!(
        session.load_module(0, None, None),
        Err(LpmError::InvalidState(_))
    ));
    assert!(matches!(
        session.run_detection(0, &image, None),
        Err(LpmError::InvalidState(_))
    ));
    assert!(matches!(
        session.run_ocr(0, &image, None, DetectionLabel::Default),
        Err(LpmError::InvalidState(_))
    ));
}

#[test]
fn drop_unloads_modules_in_load_order_then_frees() {
    let (session, journal) = open("modules/teardown");
    session.load_module(2, None, None).unwrap();
    session.load_module(0, None, None).unwrap();
    assert_eq!(session.loaded_modules(), vec![2, 0]);
    drop(session);

    let calls = journal.calls();
    assert_eq!(
        calls[calls.len() - 3..],
        [
            Call::FreeModule(2),
            Call::FreeModule(0),
            Call::Free { loaded: vec![] },
        ]
    );
}

#[test]
fn installed_modules_are_listed() {
    let (session, _journal) = open("modules/listing");
    assert_eq!(session.module_count().unwrap(), 3);

    let modules = session.modules().unwrap();
    let generic = &modules[0];
    assert_eq!(generic.name, "LPM_EU_GENERIC");
    assert_eq!(generic.id, 800);
    assert_eq!(generic.date, "2025-03-14");
    assert_eq!(generic.path, "modules/listing/LPM_EU_GENERIC");
    assert_eq!(generic.countries(), vec!["CZ", "SK", "DE", "AT", "PL"]);
    assert_eq!(generic.lp_min_mean_max_width, [60, 120, 300]);
    assert!(generic.is_active);
    assert!(generic.has_property(LPM_OCR_EU));
    assert!(!generic.has_property(LPM_DET_FRONTAL));

    let license = generic.license.unwrap();
    assert!(license.is_valid);
    assert!(license.is_time_unlimited());
    assert_eq!(license.executions_left, 1000);

    assert_eq!(modules[1].version, 1);
    assert_eq!(modules[1].subversion, 2);
    assert!(modules[1].license.is_none());
}

#[test]
fn module_lookups() {
    let (session, _journal) = open("modules/lookups");
    assert_eq!(session.module_index(800, 0, 0).unwrap(), 0);
    assert_eq!(session.module_index(801, 1, 2).unwrap(), 1);
    assert_eq!(session.module_index_by_name("LPM_LEGACY").unwrap(), 2);

    assert!(matches!(
        session.module_index(800, 9, 9),
        Err(LpmError::NotFound { function: "lpmGetModuleIndex", code: -1 })
    ));
    assert!(matches!(
        session.module_index_by_name("LPM_NOWHERE"),
        Err(LpmError::NotFound { function: "lpmGetModuleIndexByName", code: -1 })
    ));
    assert!(matches!(
        session.module_info(7),
        Err(LpmError::NativeCall { function: "lpmGetModuleInfo", code }) if code == lpm_mock::ERR_MODULE_INDEX
    ));
    assert!(matches!(
        session.module_index_by_name("bad\0name"),
        Err(LpmError::InvalidArgument(_))
    ));
}

#[test]
fn load_and_unload() {
    let (session, journal) = open("modules/load-unload");
    let count_before = session.module_count().unwrap();
    let loaded_before = session.loaded_modules();
    assert!(loaded_before.is_empty());

    session.load_module(0, None, None).unwrap();
    assert_eq!(session.loaded_modules(), vec![0]);
    assert_eq!(session.module_count().unwrap(), count_before);

    assert!(matches!(
        session.load_module(0, None, None),
        Err(LpmError::ModuleAlreadyLoaded(0))
    ));
    assert!(matches!(
        session.load_module(5, None, None),
        Err(LpmError::ModuleLoad { index: 5, code }) if code == lpm_mock::ERR_MODULE_INDEX
    ));

    session.unload_module(1).unwrap();
    assert_eq!(count(&journal, &Call::FreeModule(1)), 0);

    session.unload_module(0).unwrap();
    session.unload_module(0).unwrap();
    assert_eq!(session.loaded_modules(), loaded_before);
    assert_eq!(session.module_count().unwrap(), count_before);
    assert_eq!(count(&journal, &Call::FreeModule(0)), 1);

    session.load_module(0, None, None).unwrap();
    assert_eq!(session.loaded_modules(), vec![0]);
}

#[test]
fn load_passes_view_and_config() {
    let (session, journal) = open("modules/load-config");
    let view = CameraViewParams {
        view_type: ViewType::Frontal,
        min_horizontal_resolution: 120,
        max_horizontal_resolution: 480,
        density_ratio: 1.25,
    };
    let config = ModuleConfig {
        lpm_config_filename: Some("conf/lpm.ini".into()),
        ocr_num_threads: 2,
        det_num_threads: 4,
        ..ModuleConfig::default()
    };
    session.load_module(1, Some(&view), Some(&config)).unwrap();
    session.load_module(0, None, None).unwrap();

    let calls = journal.calls();
    let Call::LoadModule { index, view, config } = &calls[0] else {
        panic!("unexpected call {:?}", calls[0]);
    };
    assert_eq!(*index, 1);
    assert_eq!(
        *view,
        Some(LpmCameraViewParams {
            view_type: LPM_VIEW_FRONTAL,
            min_horizontal_resolution: 120,
            max_horizontal_resolution: 480,
            density_ratio: 1.25,
        })
    );
    let config = config.as_ref().unwrap();
    assert!(config.extended);
    assert_eq!(config.lpm_config_filename.as_deref(), Some("conf/lpm.ini"));
    assert_eq!(config.det_config_filename, None);
    assert_eq!(config.ocr_num_threads, 2);
    assert_eq!(config.det_num_threads, 4);
    assert!(!config.disable_det);

    assert_eq!(
        calls[1],
        Call::LoadModule {
            index: 0,
            view: None,
            config: None
        }
    );
}

#[test]
fn blank_image_has_no_detections() {
    let (session, journal) = open("modules/blank");
    let module = session.module_index(800, 0, 0).unwrap();
    session.load_module(module, None, None).unwrap();

    let image = Image::blank(100, 50).unwrap();
    let result = session.run_detection(module, &image, None).unwrap();
    assert_eq!(result.lpm_id, 800);
    assert_eq!(result.lpm_idx, module);
    assert_eq!(result.num_detections, 0);
    assert!(result.detections.is_empty());

    let calls = journal.calls();
    assert!(calls.contains(&Call::RunDet {
        index: module,
        area: LpmBoundingBox {
            top_left_col: 0.0,
            top_left_row: 0.0,
            top_right_col: 99.0,
            top_right_row: 0.0,
            bot_left_col: 0.0,
            bot_left_row: 49.0,
            bot_right_col: 99.0,
            bot_right_row: 49.0,
        },
    }));
    assert_eq!(count(&journal, &Call::FreeDetResult), 1);
    assert_eq!(journal.live_results(), 0);
}

#[test]
fn detection_is_copied_before_free() {
    let (session, journal) = open("modules/detection");
    session.load_module(0, None, None).unwrap();

    let result = session.run_detection(0, &plate_image(), None).unwrap();
    assert_eq!(journal.live_results(), 0);
    assert_eq!(result.num_detections, 1);

    let plate = &result.detections[0];
    assert_eq!(plate.confidence, lpm_mock::DETECTION_CONFIDENCE);
    assert_eq!(plate.position, BoundingBox::from_rect(20.0, 10.0, 59.0, 24.0));
    assert_eq!(plate.label, DetectionLabel::LicensePlateEuOneLine);
    assert_eq!(plate.crop_to_source(0.0, 0.0), (20.0, 10.0));
    assert_eq!(plate.crop_to_source(39.0, 14.0), (59.0, 24.0));

    let crop = plate.crop.as_ref().unwrap();
    assert_eq!((crop.width, crop.height, crop.num_channels), (40, 15, 3));
    assert_eq!(crop.data.len(), 40 * 15 * 3);
    assert!(crop.data.iter().all(|&v| v == 255));
    let rgb = crop.to_rgb_image().unwrap();
    assert_eq!(rgb.dimensions(), (40, 15));
}

#[test]
fn detection_extension_is_reported() {
    let (session, _journal) = open("modules/extension");
    session.load_module(0, None, None).unwrap();

    let result = session.run_detection(0, &plate_image(), None).unwrap();
    let plate = &result.detections[0];
    assert!(plate.extension.is_some());
    assert_eq!(plate.occlusion(), 0.0);
    assert_eq!(plate.truncated(), 0);
    assert_eq!(plate.cluster_id(), lpm_mock::CLUSTER_ID);
    assert_eq!(plate.cluster_confidence(), lpm_mock::CLUSTER_CONFIDENCE);
}

#[test]
fn legacy_module_reports_sentinels() {
    let (session, _journal) = open("modules/legacy");
    let module = session.module_index_by_name("LPM_LEGACY").unwrap();
    session.load_module(module, None, None).unwrap();
    let image = plate_image();

    let result = session.run_detection(module, &image, None).unwrap();
    assert_eq!(result.lpm_id, 900);
    let plate = &result.detections[0];
    assert!(plate.extension.is_none());
    assert_eq!(plate.occlusion(), -1.0);
    assert_eq!(plate.truncated(), -1);
    assert_eq!(plate.cluster_id(), -1);
    assert_eq!(plate.cluster_confidence(), 0.0);

    let ocr = session
        .run_ocr(module, &image, Some(&plate.position), plate.label)
        .unwrap();
    let best = ocr.best().unwrap();
    assert!(best.extension.is_none());
    assert_eq!(best.unreadable(), -1.0);
    assert_eq!(best.obstructed(), -1.0);
}

#[test]
fn bounding_box_limits_the_search() {
    let (session, journal) = open("modules/search-area");
    session.load_module(0, None, None).unwrap();
    let image = plate_image();

    let corner = BoundingBox::from_rect(0.0, 0.0, 10.0, 10.0);
    let result = session.run_detection(0, &image, Some(&corner)).unwrap();
    assert!(result.detections.is_empty());

    let result = session
        .run_detection(0, &image, Some(&BoundingBox::default()))
        .unwrap();
    assert_eq!(result.detections.len(), 1);

    let areas: Vec<LpmBoundingBox> = journal
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::RunDet { area, .. } => Some(area),
            _ => None,
        })
        .collect();
    let expected: Vec<LpmBoundingBox> = vec![(&corner).into(), (&image.full_box()).into()];
    assert_eq!(areas, expected);
}

#[test]
fn ocr_text_is_decoded() {
    let (session, journal) = open("modules/ocr");
    session.load_module(0, None, None).unwrap();
    let image = plate_image();
    let result = session.run_detection(0, &image, None).unwrap();
    let plate = &result.detections[0];

    let ocr = session
        .run_ocr(0, &image, Some(&plate.position), plate.label)
        .unwrap();
    assert_eq!(journal.live_results(), 0);
    assert_eq!(ocr.lpm_id, 800);
    assert_eq!(ocr.num_hypotheses, 2);

    let best = ocr.best().unwrap();
    assert_eq!(best.confidence, lpm_mock::BEST_CONFIDENCE);
    assert_eq!(best.num_lines, 2);
    assert_eq!(best.text(), lpm_mock::PLATE_LINES.join("\n"));
    assert_eq!(best.plate_type, "CZ");
    assert_eq!(best.lp_dimensions.physical_width, 520);
    assert_eq!(best.lp_dimensions.physical_height, 110);
    assert_eq!(best.unreadable(), lpm_mock::UNREADABLE);
    assert_eq!(best.obstructed(), lpm_mock::OBSTRUCTED);

    let line = &best.text_lines[1];
    assert_eq!(line.characters, "PRAHA Ř🚚");
    assert_eq!(line.length as usize, line.characters.chars().count());
    assert_eq!(line.character_confidences.len(), line.length as usize);

    let alternative = &ocr.hypotheses[1];
    assert_eq!(alternative.text(), lpm_mock::ALTERNATIVE_LINE);
    assert_eq!(alternative.plate_type, "SK");

    assert!(journal.calls().contains(&Call::RunOcr {
        index: 0,
        area: (&plate.position).into(),
        label: LPM_LABEL_LP_EU_ONE_LINE,
    }));
}

#[test]
fn invalid_code_points_are_replaced() {
    let (session, _journal) = open("modules/ocr-invalid");
    session.load_module(0, None, None).unwrap();

    let ocr = session
        .run_ocr(0, &plate_image(), None, DetectionLabel::Trash)
        .unwrap();
    let first = &ocr.best().unwrap().text_lines[0];
    assert_eq!(first.characters, format!("{}\u{FFFD}", lpm_mock::PLATE_LINES[0]));
    assert_eq!(first.length as usize, first.characters.chars().count());
}

#[test]
fn failed_runs_report_last_error() {
    let (session, _journal) = open("modules/run-errors");
    let image = plate_image();

    assert!(matches!(
        session.run_detection(0, &image, None),
        Err(LpmError::Run { function: "lpmRunDet", code }) if code == lpm_mock::ERR_NOT_LOADED
    ));

    let config = ModuleConfig {
        disable_det: true,
        ..ModuleConfig::default()
    };
    session.load_module(0, None, Some(&config)).unwrap();
    assert!(matches!(
        session.run_detection(0, &image, None),
        Err(LpmError::Run { function: "lpmRunDet", code }) if code == lpm_mock::ERR_DISABLED
    ));
    assert!(session.run_ocr(0, &image, None, DetectionLabel::Default).is_ok());
}

#[test]
fn view_config_files() {
    let engine = engine();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("view.cfg");

    let params = CameraViewParams {
        view_type: ViewType::Frontal,
        min_horizontal_resolution: 150,
        max_horizontal_resolution: 600,
        density_ratio: 0.5,
    };
    engine.write_view_config(&path, &params).unwrap();
    assert_eq!(engine.load_view_config(Some(path.as_path())).unwrap(), params);

    let defaults = engine.load_view_config(None).unwrap();
    assert_eq!(defaults.view_type, ViewType::Generic);
    assert_eq!(defaults.min_horizontal_resolution, 90);
    assert_eq!(defaults.max_horizontal_resolution, 500);

    let missing = dir.path().join("absent.cfg");
    assert!(matches!(
        engine.load_view_config(Some(missing.as_path())),
        Err(LpmError::NativeCall { function: "lpmLoadViewConfig", code }) if code == lpm_mock::ERR_FILE
    ));
}

#[test]
fn engine_error_log() {
    let engine = engine();
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("lpm-errors.log");

    engine.open_error_log(&log).unwrap();
    let (session, _journal) = open("modules/error-log");
    assert!(session.module_index(12345, 0, 0).is_err());
    engine.close_error_log();

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("module index out of range"));
}

#[test]
fn session_is_shared_between_threads() {
    let (session, journal) = open("modules/threads");
    session.load_module(0, None, None).unwrap();
    let session = Arc::new(session);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let session = session.clone();
            thread::spawn(move || {
                let image = plate_image();
                session.run_detection(0, &image, None).unwrap().detections.len()
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap(), 1);
    }

    assert_eq!(count(&journal, &Call::FreeDetResult), 4);
    assert_eq!(journal.live_results(), 0);
}
