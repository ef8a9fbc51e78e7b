//! Notification sound playback.

use std::process::Stdio;

use fnott_config::{Config, Urgency};
use tokio::process::Command;
use tracing::{debug, warn};

/// Plays the configured sound for `urgency`, if any.
///
/// The `play-sound` command template is expanded with the per-urgency
/// `sound-file` and spawned fire-and-forget; a failing player is logged,
/// never fatal.
pub fn play(config: &Config, urgency: Urgency) {
    let Some(sound_file) = config.urgency(urgency).sound_file.as_ref() else {
        return;
    };

    if config.play_sound.is_empty() {
        return;
    }

    let argv = config
        .play_sound
        .expand(&[("filename", &sound_file.display().to_string())]);

    let Some((program, args)) = argv.split_first() else {
        return;
    };

    debug!(cmd = ?argv, "playing notification sound");

    match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(mut child) => {
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) if !status.success() => {
                        warn!(code = ?status.code(), "sound player exited with failure");
                    }
                    Err(e) => warn!(error = %e, "cannot wait on sound player"),
                    Ok(_) => {}
                }
            });
        }
        Err(e) => warn!(error = %e, "cannot spawn sound player"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use fnott_config::SpawnTemplate;

    use super::*;

    #[tokio::test]
    async fn no_sound_file_is_a_no_op() {
        let config = Config::default();

        // Nothing to assert beyond "does not panic or spawn".
        play(&config, Urgency::Normal);
    }

    #[tokio::test]
    async fn configured_sound_spawns_the_player() {
        let mut config = Config::default();
        config.by_urgency[Urgency::Normal.index()].sound_file = Some(PathBuf::from("/dev/null"));
        config.play_sound = SpawnTemplate::parse("true ${filename}").unwrap();

        play(&config, Urgency::Normal);
    }
}
