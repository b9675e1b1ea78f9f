//! Submit a video generation task and poll until it finishes.
//!
//! Run with:
//! ```bash
//! export ZAI_API_KEY="your-id.your-secret"
//! cargo run --example video_generation
//! ```

use std::time::Duration;
use zai::services::videos::VideoCreateParams;
use zai::ZaiClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let api_key =
        std::env::var("ZAI_API_KEY").expect("ZAI_API_KEY environment variable must be set");
    let client = ZaiClient::zai(api_key)?;
    let videos = client.videos();

    let params = VideoCreateParams::new("cogvideox-3", "A red panda rowing a boat at sunrise")
        .with_quality("quality")
        .with_audio(true)
        .with_size("1920x1080")
        .with_fps(30);

    let task = match videos.generations(params).await?.into_result() {
        Ok(task) => task,
        Err(error) => {
            eprintln!("submission failed: {}", error.message);
            return Ok(());
        }
    };
    let Some(task_id) = task.id else {
        eprintln!("no task id returned");
        return Ok(());
    };
    println!("submitted task {}", task_id);

    loop {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let video = match videos.generations_result(&task_id).await?.into_result() {
            Ok(video) => video,
            Err(error) => {
                eprintln!("poll failed: {}", error.message);
                continue;
            }
        };

        println!("status: {:?}", video.task_status);
        if video.is_finished() {
            for result in &video.video_result {
                println!("video: {}\ncover: {}", result.url, result.cover_image_url);
            }
            break;
        }
    }

    Ok(())
}
