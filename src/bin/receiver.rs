//! Receiver/client CLI: connects to a sender, runs one PSI session, and
//! prints the intersection it learns.
//!
//! Grounded on `client.cpp`'s handshake order; flag parsing follows
//! `prover.rs`'s hand-rolled `parse_flag`/`parse_u64` convention.

#![forbid(unsafe_code)]

use std::env;
use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;

use rand::SeedableRng;

use privcats::backend::FheBackend;
use privcats::params::PsiParams;
use privcats::receiver::Receiver;
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
        .map(|t| parse_u64_one(t.trim()).ok_or_else(|| anyhow::anyhow!("invalid input element `{t}`")))
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args: Vec<String> = env::args().collect();
    let host = parse_flag(&args, "--host").unwrap_or_else(|| "localhost".to_string());
    let port = parse_flag(&args, "--port").and_then(|s| s.parse().ok()).unwrap_or(9999u16);
    let input_bits: u32 = parse_flag(&args, "--input-bits").and_then(|s| s.parse().ok()).unwrap_or(32);
    let inputs = match parse_flag(&args, "--inputs") {
        Some(s) => parse_u64_list(&s)?,
        None => vec![0x02, 0x07, 0x05, 0xfe],
    };
    let labeled = args.iter().any(|a| a == "--labeled");

    tracing::info!(host = %host, port, inputs = inputs.len(), "connecting to sender");
    let stream = TcpStream::connect((host.as_str(), port))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    eprintln!("connected, waiting for hello and set size");
    let sender_size = wire::read_hello::<_, <Backend as FheBackend>::Error>(&mut reader)?;

    eprintln!("picking params");
    let mut params = PsiParams::new_r(inputs.len(), sender_size as usize, input_bits, 8192)?;
    let mut rng = rand::rngs::StdRng::from_entropy();
    params.generate_seeds(&mut rng);

    let backend = build_backend(&params)?;
    let receiver = Receiver::new(params.clone(), backend)?;

    eprintln!("sending hello, set size, seeds, pk, relin keys");
    wire::write_hello::<_, <Backend as FheBackend>::Error>(&mut writer, inputs.len() as u64)?;
    wire::write_u64_vec::<_, <Backend as FheBackend>::Error>(&mut writer, params.seeds())?;
    wire::write_public_key(&mut writer, receiver.backend(), receiver.public_key())?;
    wire::write_relin_keys(&mut writer, receiver.backend(), &receiver.relin_keys()?)?;
    writer.flush()?;

    eprintln!("encrypting inputs");
    let (encrypted_inputs, buckets) = receiver.encrypt_inputs(&mut rng, &inputs)?;

    eprintln!("sending inputs");
    wire::write_ciphertext_vec(&mut writer, receiver.backend(), &encrypted_inputs)?;
    writer.flush()?;

    eprintln!("waiting for encrypted matches");
    let encrypted_matches = wire::read_ciphertext_vec(&mut reader, receiver.backend())?;

    eprintln!("decrypting matches");
    if labeled {
        let matches = receiver.decrypt_labeled_matches(&encrypted_matches)?;
        print!("{} matches found: ", matches.len());
        for (bucket, label) in matches {
            if let privcats::hashing::BucketSlot::Occupied { input_index, .. } = buckets[bucket] {
                print!(
                    "0x{}:0x{} ",
                    hex::encode(inputs[input_index].to_be_bytes()),
                    hex::encode(label.to_be_bytes())
                );
            }
        }
        println!();
    } else {
        let matches = receiver.decrypt_matches(&encrypted_matches)?;
        print!("{} matches found: ", matches.len());
        for bucket in matches {
            if let privcats::hashing::BucketSlot::Occupied { input_index, .. } = buckets[bucket] {
                print!("0x{} ", hex::encode(inputs[input_index].to_be_bytes()));
            }
        }
        println!();
    }

    Ok(())
}
