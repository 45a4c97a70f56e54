use clap::Parser;
use std::path::PathBuf;

use lpm::error::LpmError;
use lpm::loader::{Engine, default_library_path, default_modules_dir};
use lpm::{CameraViewParams, Image, Session, Settings};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "lpm_reader")]
struct Args {
    /// images to read plates from
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// SDK root directory (contains LPM/ and modules-v<version>/)
    #[arg(long, default_value = ".")]
    sdk_dir: PathBuf,

    /// engine library, defaults to the SDK layout
    #[arg(long)]
    library: Option<PathBuf>,

    /// modules directory, defaults to the SDK layout
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// major version of the engine
    #[arg(long, default_value_t = 7)]
    lpm_version: u32,

    /// id of the module to load
    #[arg(long, default_value_t = 800)]
    module_id: i32,

    /// version of the module to load
    #[arg(long, default_value_t = 0)]
    module_version: i32,

    /// subversion of the module to load
    #[arg(long, default_value_t = 0)]
    module_subversion: i32,

    /// load the module by name instead of id
    #[arg(long)]
    module_name: Option<String>,

    /// TOML settings with [camera] and [module] tables
    #[arg(long)]
    settings: Option<PathBuf>,

    /// camera view config file read by the engine, overrides [camera]
    #[arg(long)]
    view_config: Option<PathBuf>,

    /// file for the engine's own error log
    #[arg(long)]
    error_log: Option<PathBuf>,

    /// directory to save detection crops into
    #[arg(long)]
    save_crops: Option<PathBuf>,
}

fn main() -> Result<(), LpmError> {
    init_tracing();

    let args = Args::parse();

    let library = args
        .library
        .clone()
        .unwrap_or_else(|| default_library_path(&args.sdk_dir, args.lpm_version));
    let modules_dir = args
        .modules_dir
        .clone()
        .unwrap_or_else(|| default_modules_dir(&args.sdk_dir, args.lpm_version));

    let settings = match &args.settings {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    // SAFETY:
    // - `Engine::load` is unsafe because the exported symbols cannot be checked
    //   against the declared signatures. The user points us at an LPM engine
    //   build whose headers match `lpm_sys`.
    let engine = unsafe { Engine::load(&library)? };
    tracing::info!(
        version = %engine.version(),
        compiled = %engine.compilation_date(),
        "engine ready"
    );

    if let Some(path) = &args.error_log {
        engine.open_error_log(path)?;
    }

    let session = Session::init(engine.clone(), &modules_dir)?;
    for info in session.modules()? {
        tracing::info!(
            id = info.id,
            name = %info.name,
            version = %format!("{}.{}", info.version, info.subversion),
            date = %info.date,
            "available module"
        );
    }

    let camera: Option<CameraViewParams> = match &args.view_config {
        Some(path) => Some(engine.load_view_config(Some(path.as_path()))?),
        None => settings.camera,
    };
    if let Some(camera) = &camera {
        tracing::info!(
            min = camera.min_horizontal_resolution,
            max = camera.max_horizontal_resolution,
            density_ratio = camera.density_ratio,
            "camera view"
        );
    }

    let module = match &args.module_name {
        Some(name) => session.module_index_by_name(name)?,
        None => session.module_index(args.module_id, args.module_version, args.module_subversion)?,
    };
    session.load_module(module, camera.as_ref(), settings.module.as_ref())?;

    if let Some(dir) = &args.save_crops {
        std::fs::create_dir_all(dir)?;
    }

    let mut total = 0usize;
    for path in &args.images {
        let image = Image::open(path)?;
        let detections = session.run_detection(module, &image, None)?;
        tracing::info!(
            image = %path.display(),
            detections = detections.num_detections,
            "detection done"
        );

        for (n, detection) in detections.detections.iter().enumerate() {
            let ocr = session.run_ocr(module, &image, Some(&detection.position), detection.label)?;
            match ocr.best() {
                Some(hypothesis) => tracing::info!(
                    detection = n + 1,
                    confidence = detection.confidence,
                    plate_type = %hypothesis.plate_type,
                    width_mm = hypothesis.lp_dimensions.physical_width,
                    height_mm = hypothesis.lp_dimensions.physical_height,
                    text = %hypothesis.text(),
                    "plate"
                ),
                None => tracing::info!(detection = n + 1, "no text"),
            }

            if let (Some(dir), Some(crop)) = (&args.save_crops, &detection.crop) {
                if let Some(rgb) = crop.to_rgb_image() {
                    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
                    let out = dir.join(format!("{stem}-{}.png", n + 1));
                    rgb.save(&out)?;
                    tracing::debug!(output_file = %out.display(), "crop saved");
                }
            }
            total += 1;
        }
    }

    tracing::info!(total, "detections in total");

    session.close();
    if args.error_log.is_some() {
        engine.close_error_log();
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
