//! Builds the GLSL that gets compiled for a render pass: a fixed prologue that
//! matches the player's descriptor set layout, followed by the pass code
//! exactly as Shadertoy serves it.
//!
//! The prologue declares `iChannel0..3` at set 0, bindings 0-3, and the
//! `ShaderToyUniforms` block at binding 4. Its `main` flips `gl_FragCoord` to a
//! lower-left origin before calling `mainImage`; cached binaries depend on that
//! flip, so it is part of the template rather than a runtime option.
use std::fmt;

use crate::descriptor::{ChannelType, RenderInput, CHANNEL_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerType {
    /// No input bound. Emitted as a bare `sampler` declaration.
    #[default]
    Unbound,
    Texture2D,
    Cube,
}

impl SamplerType {
    pub fn token(self) -> &'static str {
        match self {
            Self::Unbound => "",
            Self::Texture2D => "2D",
            Self::Cube => "Cube",
        }
    }
}

impl fmt::Display for SamplerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl From<ChannelType> for SamplerType {
    fn from(kind: ChannelType) -> Self {
        match kind {
            ChannelType::Texture | ChannelType::Music => Self::Texture2D,
            ChannelType::Cubemap => Self::Cube,
        }
    }
}

pub fn infer_sampler_types(inputs: &[RenderInput]) -> [SamplerType; CHANNEL_COUNT] {
    let mut samplers = [SamplerType::Unbound; CHANNEL_COUNT];
    for input in inputs {
        let slot = samplers.get_mut(usize::from(input.channel));
        if let (Some(slot), Some(kind)) = (slot, input.channel_type()) {
            *slot = kind.into();
        }
    }
    samplers
}

pub fn shader_header(samplers: &[SamplerType; CHANNEL_COUNT]) -> String {
    let [s0, s1, s2, s3] = samplers;
    format!(
        r"#version 450
#pragma shader_stage(fragment)
layout (location = 0) out vec4 out_fragColor;
in vec4 gl_FragCoord;

// input channel.
layout (set = 0, binding = 0) uniform sampler{s0} iChannel0;
layout (set = 0, binding = 1) uniform sampler{s1} iChannel1;
layout (set = 0, binding = 2) uniform sampler{s2} iChannel2;
layout (set = 0, binding = 3) uniform sampler{s3} iChannel3;
// input uniforms. NOTE: declaraction order is different from shadertoy due to packing rules
layout (set = 0, binding = 4) uniform ShaderToyUniforms {{
  vec3      iResolution;           // viewport resolution (in pixels)
  float     iChannelTime[4];       // channel playback time (in seconds)
  vec3      iChannelResolution[4]; // channel resolution (in pixels)
  vec4      iMouse;                // mouse pixel coords. xy: current (if MLB down), zw: click
  vec4      iDate;                 // (year, month, day, time in seconds)
  float     iTime;                 // shader playback time (in seconds)
  float     iTimeDelta;            // render time (in seconds)
  int       iFrame;                // shader playback frame
  float     iSampleRate;           // sound sample rate (i.e., 44100)
}};

void mainImage(out vec4 fragColor, in vec2 fragCoord);
void main() {{
  // Need to manually flip the fragcoord to a lower-left origin
  mainImage(out_fragColor, vec2(gl_FragCoord.x, iResolution.y - gl_FragCoord.y));
  out_fragColor.w = 1.0;
}}

////////////////////////////////////////////////////////////////////////////////////////////////

"
    )
}

/// Full compilable source for a pass. Deterministic in its inputs, which is
/// what lets the materializer skip unchanged files by hash.
pub fn generate_source(samplers: &[SamplerType; CHANNEL_COUNT], code: &str) -> String {
    let mut source = shader_header(samplers);
    source.push_str(code);
    source
}
