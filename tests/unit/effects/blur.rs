use super::*;

#[test]
fn radius_zero_is_identity() {
    let src = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
    let k = GaussianKernel::new(0, None).unwrap();
    assert_eq!(blur_premul(&src, 1, 2, &k).unwrap(), src);
}

#[test]
fn kernel_weights_sum_to_one() {
    for radius in [1u32, 2, 5, 17] {
        let k = GaussianKernel::new(radius, None).unwrap();
        assert_eq!(k.weights().len(), (2 * radius + 1) as usize);
        assert_eq!(k.weights().iter().sum::<u32>(), 1 << 16);
    }
}

#[test]
fn rejects_bad_sigma() {
    assert!(GaussianKernel::new(3, Some(0.0)).is_err());
    assert!(GaussianKernel::new(3, Some(f32::NAN)).is_err());
}

#[test]
fn interior_of_constant_image_is_unchanged() {
    let (w, h) = (9u32, 9u32);
    let px = [10u8, 20, 30, 40];
    let src = px.repeat((w * h) as usize);
    let k = GaussianKernel::new(2, Some(1.0)).unwrap();
    let out = blur_premul(&src, w, h, &k).unwrap();
    let center = ((4 * w + 4) * 4) as usize;
    assert_eq!(&out[center..center + 4], &px);
}

#[test]
fn edges_fade_toward_transparent() {
    let (w, h) = (5u32, 5u32);
    let src = [0u8, 0, 0, 255].repeat((w * h) as usize);
    let k = GaussianKernel::new(2, Some(1.0)).unwrap();
    let out = blur_premul(&src, w, h, &k).unwrap();
    assert!(out[3] < 255);
    let center = ((2 * w + 2) * 4) as usize;
    assert!(out[center + 3] > out[3]);
}

#[test]
fn spreads_a_single_pixel() {
    let (w, h) = (7u32, 7u32);
    let mut src = vec![0u8; (w * h * 4) as usize];
    let center = ((3 * w + 3) * 4) as usize;
    src[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

    let k = GaussianKernel::new(2, Some(1.2)).unwrap();
    let out = blur_premul(&src, w, h, &k).unwrap();

    assert!(out.chunks_exact(4).filter(|px| px[3] != 0).count() > 1);
    let sum_a: i32 = out.chunks_exact(4).map(|px| i32::from(px[3])).sum();
    assert!((sum_a - 255).abs() <= 16);
}

#[test]
fn length_mismatch_is_an_error() {
    let k = GaussianKernel::new(1, None).unwrap();
    let err = blur_premul(&[0u8; 12], 2, 2, &k).unwrap_err();
    assert!(err.to_string().starts_with("invalid geometry:"));
}
