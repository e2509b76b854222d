//! Sender/server CLI: accepts one receiver connection, runs one PSI
//! session, and sends back the (possibly labeled) match ciphertexts.
//!
//! Grounded on `server.cpp`'s handshake order; flag parsing follows
//! `verifier.rs`'s hand-rolled `parse_flag` convention.

#![forbid(unsafe_code)]

use std::env;
use std::io::{BufReader, BufWriter, Write};
use std::net::TcpListener;

use rand::SeedableRng;

use privcats::backend::FheBackend;
use privcats::params::PsiParams;
use privcats::sender::Sender;
use privcats::wire;

#[cfg(feature = "mock-backend")]
type Backend = privcats::backend::mock::MockBackend;
#[cfg(not(feature = "mock-backend"))]
type Backend = privcats::backend::seal::SealBackend;

fn build_backend(params: &PsiParams) -> anyhow::Result<Backend> {
    #[cfg(feature = "mock-backend")]
    {
        Ok(Backend::new(params.poly_modulus_degree(), params.plain_modulus()))
    }
    #[cfg(not(feature = "mock-backend"))]
    {
        Ok(Backend::new(params.poly_modulus_degree(), params.plain_modulus())?)
    }
}

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn parse_u64_one(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<u64>().ok()
    }
}

fn parse_u64_list(s: &str) -> anyhow::Result<Vec<u64>> {
    s.split(',')
        .map(|t| parse_u64_one(t.trim()).ok_or_else(|| anyhow::anyhow!("invalid element `{t}`")))
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args: Vec<String> = env::args().collect();
    let port = parse_flag(&args, "--port").and_then(|s| s.parse().ok()).unwrap_or(9999u16);
    let input_bits: u32 = parse_flag(&args, "--input-bits").and_then(|s| s.parse().ok()).unwrap_or(32);
    let poly_modulus_degree: usize = parse_flag(&args, "--poly-modulus-degree").and_then(|s| s.parse().ok()).unwrap_or(8192);
    let inputs = match parse_flag(&args, "--inputs") {
        Some(s) => parse_u64_list(&s)?,
        None => vec![0x01, 0x02, 0x03, 0x04, 0x07, 0x22, 0xca, 0xfe],
    };
    let labels = match parse_flag(&args, "--labels") {
        Some(s) => Some(parse_u64_list(&s)?),
        None => None,
    };

    let listener = TcpListener::bind(("0.0.0.0", port))?;
    tracing::info!(port, inputs = inputs.len(), "listening");
    eprintln!("listening");

    let (stream, peer) = listener.accept()?;
    tracing::info!(%peer, "accepted connection");
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    eprintln!("accepted, sending hello and set size");
    wire::write_hello::<_, <Backend as FheBackend>::Error>(&mut writer, inputs.len() as u64)?;
    writer.flush()?;

    eprintln!("waiting for hello");
    let receiver_size = wire::read_hello::<_, <Backend as FheBackend>::Error>(&mut reader)?;
    eprintln!("waiting for seeds");
    let seeds = wire::read_u64_vec::<_, <Backend as FheBackend>::Error>(&mut reader)?;

    let mut params = PsiParams::new_r(receiver_size as usize, inputs.len(), input_bits, poly_modulus_degree)?;
    params.set_seeds_r(seeds)?;

    let backend = build_backend(&params)?;

    eprintln!("waiting for public key");
    let receiver_pk = wire::read_public_key(&mut reader, &backend)?;
    eprintln!("waiting for relin keys");
    let receiver_rk = wire::read_relin_keys(&mut reader, &backend)?;
    eprintln!("waiting for inputs");
    let receiver_inputs = wire::read_ciphertext_vec(&mut reader, &backend)?;

    eprintln!("computing matches");
    let mut rng = rand::rngs::StdRng::from_entropy();
    let sender = Sender::new(params, backend);
    let sender_matches = sender.compute_matches(
        &mut rng,
        &inputs,
        labels.as_deref(),
        &receiver_pk,
        &receiver_rk,
        &receiver_inputs,
        None,
    )?;

    eprintln!("sending matches");
    wire::write_ciphertext_vec(&mut writer, sender.backend(), &sender_matches)?;
    writer.flush()?;

    Ok(())
}
