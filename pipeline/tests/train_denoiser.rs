mod common;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use common::{FakeRenderer, SIZE, write_config};
use pipeline::DenoiserTraining;
use pipeline::export::denoise_file;
use pipeline::prepare::generate_render_target;
use pipeline::RenderTargetRequest;
use serde_json::json;
use train::config::TrainerConfig;

#[tokio::test]
async fn renders_then_trains_then_denoises() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("renders");
    let config = json!({
        "folder_out": out,
        "scene_path": "scene.xml",
        "render_targets": {"dataset": {"4": 20, "16": 1}},
    });
    let request = RenderTargetRequest::new(write_config(dir.path(), &config))
        .with_render_target("dataset".to_owned());
    generate_render_target(&mut FakeRenderer::default(), &request)
        .await
        .unwrap();

    let mut training = DenoiserTraining::new(None)
        .with_trainer(TrainerConfig::new().with_max_epochs(2).with_log_every_n_steps(1));
    training.model = training.model.with_hidden(4).with_depth(1);
    training.data = training
        .data
        .with_data_dir(out.to_string_lossy().into_owned())
        .with_batch_size(8);
    training.run.checkpoint = training
        .run
        .checkpoint
        .with_dirpath(dir.path().join("ckpt"));
    training.run.logger = training.run.logger.with_save_dir(dir.path().join("runs"));

    // 20 inputs: 16 train items in batches of 8, one validation item.
    let outcome = training.run::<Autodiff<NdArray>>().unwrap();
    assert_eq!(outcome.epochs, 2);
    assert_eq!(outcome.global_step, 4);
    assert!(outcome.last_metrics.contains_key("validation/loss"));

    let ckpt = dir.path().join("ckpt");
    let last = ckpt.join("last.mpk");
    assert!(last.is_file());
    let epochs = std::fs::read_dir(&ckpt)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("epoch="))
        .count();
    assert_eq!(epochs, 2);
    assert!(
        dir.path()
            .join("runs/Denoiser/Baseline/metrics.jsonl")
            .is_file()
    );

    let denoised = dir.path().join("denoised/out.exr");
    denoise_file::<NdArray>(
        &training.model,
        &last,
        &out.join("render_4").join("spp_0th_0.exr"),
        &denoised,
        &NdArrayDevice::Cpu,
    )
    .unwrap();
    let image = image::open(&denoised).unwrap();
    assert_eq!((image.width(), image.height()), (SIZE, SIZE));
}
