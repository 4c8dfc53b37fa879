use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

/// Orders input devices into the capture preference list used by
/// [`crate::MicSource::open`]: an explicitly requested device first, then
/// names that advertise voice processing, then the ALSA/PipeWire bridge
/// devices, then the host default, then everything else.
pub struct SourceSelector {
    host: Host,
}

impl Default for SourceSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceSelector {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn input_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(inputs) = self.host.input_devices() {
            for device in inputs {
                if let Ok(name) = device.name() {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn default_input_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    /// Preference-ordered candidates. A `None` entry means "whatever the
    /// host considers its default input" and is always the last resort.
    pub fn candidates(&self, preferred: Option<&str>) -> Vec<Option<String>> {
        order_candidates(preferred, self.input_names(), self.default_input_name())
    }

    pub fn open(&self, name: Option<&str>) -> Option<Device> {
        match name {
            Some(wanted) => self.find_by_name(wanted),
            None => self.host.default_input_device(),
        }
    }

    fn find_by_name(&self, wanted: &str) -> Option<Device> {
        if let Ok(devices) = self.host.input_devices() {
            for device in devices {
                if device.name().map(|n| n == wanted).unwrap_or(false) {
                    return Some(device);
                }
            }
        }
        None
    }
}

/// True for device names that advertise voice-optimized processing
/// (echo cancellation, communications profiles).
fn is_voice_optimized(name: &str) -> bool {
    let lname = name.to_lowercase();
    ["voice", "communication", "speech", "echo-cancel"]
        .iter()
        .any(|p| lname.contains(p))
}

fn order_candidates(
    preferred: Option<&str>,
    all: Vec<String>,
    host_default: Option<String>,
) -> Vec<Option<String>> {
    let mut out: Vec<Option<String>> = Vec::new();
    let push = |candidate: Option<String>, out: &mut Vec<Option<String>>| {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    };

    if let Some(p) = preferred {
        push(Some(p.to_string()), &mut out);
    }
    for name in &all {
        if is_voice_optimized(name) {
            push(Some(name.clone()), &mut out);
        }
    }
    for bridge in ["default", "pipewire"] {
        if all.iter().any(|n| n == bridge) {
            push(Some(bridge.to_string()), &mut out);
        }
    }
    if let Some(def) = host_default {
        push(Some(def), &mut out);
    }
    for name in all {
        push(Some(name), &mut out);
    }
    push(None, &mut out);
    out
}
