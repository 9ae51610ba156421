//! G.711 μ-law companding for the PCMU wire format.

const CLIP: i32 = 32635;
const BIAS: i32 = 0x84;

/// Encodes one 16-bit linear sample to μ-law.
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign: u8 = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };
    if pcm > CLIP {
        pcm = CLIP;
    }
    pcm += BIAS;

    let mut exponent: u8 = 7;
    let mut mask = 0x4000;
    while exponent > 0 && (pcm & mask) == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = ((pcm >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}

/// Decodes one μ-law byte to a 16-bit linear sample.
pub fn mulaw_to_linear(byte: u8) -> i16 {
    let b = !byte;
    let sign = b & 0x80;
    let exponent = (b >> 4) & 0x07;
    let mantissa = (b & 0x0F) as i32;

    let mut sample = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if sign != 0 {
        sample = -sample;
    }
    sample as i16
}

/// Encodes a block of f32 samples in [-1.0, 1.0] to μ-law bytes.
pub fn encode_f32(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .map(|&s| {
            let clamped = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
            linear_to_mulaw(clamped)
        })
        .collect()
}

/// Decodes a block of μ-law bytes to f32 samples in [-1.0, 1.0].
pub fn decode_to_f32(payload: &[u8]) -> Vec<f32> {
    payload
        .iter()
        .map(|&b| mulaw_to_linear(b) as f32 / 32768.0)
        .collect()
}
