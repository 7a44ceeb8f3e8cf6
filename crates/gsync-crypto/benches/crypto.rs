use gsync_core::GradePayload;
use gsync_crypto::{MobileCipher, WebCipher};
use secrecy::SecretString;

fn make_payload(subjects: usize) -> GradePayload {
    let subjects: Vec<_> = (0..subjects)
        .map(|i| {
            serde_json::json!({
                "name": format!("Subject {i}"),
                "grades": (0..8).map(|g| serde_json::json!({
                    "value": 1.0 + (g as f64) * 0.5,
                    "weight": 1,
                    "type": "exam",
                    "date": "2024-05-01"
                })).collect::<Vec<_>>()
            })
        })
        .collect();
    serde_json::from_value(serde_json::json!({ "subjects": subjects })).unwrap()
}

#[divan::bench(args = [1, 12, 48])]
fn bench_web_encrypt(bencher: divan::Bencher, subjects: usize) {
    let cipher = WebCipher::default();
    let password = SecretString::from("correct-horse");
    let payload = make_payload(subjects);
    bencher.bench(|| {
        cipher
            .encrypt(divan::black_box(&payload), divan::black_box(&password))
            .unwrap()
    });
}

#[divan::bench(args = [1, 12, 48])]
fn bench_mobile_roundtrip(bencher: divan::Bencher, subjects: usize) {
    let cipher = MobileCipher::default();
    let payload = make_payload(subjects);
    bencher.bench(|| {
        let env = cipher
            .encrypt(divan::black_box(&payload), "64f1c0ffee")
            .unwrap();
        cipher.decrypt(&env, "64f1c0ffee").unwrap()
    });
}

fn main() {
    divan::main();
}
