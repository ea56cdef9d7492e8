/// L2-normalizes in place. Near-zero vectors are left as they are.
pub fn l2_normalize(v: &mut [f32]) {
    let eps = 1e-12f32;
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= eps {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}
