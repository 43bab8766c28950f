//! Command-line front end for the ringfe IPFE engine.
//!
//! Several commands may be chained in one invocation; generated objects
//! (parameters, keys, ciphertexts) stay in the session between commands,
//! and each can be persisted with `-o` / reloaded with the matching flag.
//!
//! ```text
//! ringfe gen-params -l 4 -x 10 -y 10 -o params.json \
//!        gen-secret-key -o msk.json \
//!        gen-public-key -o mpk.json \
//!        encrypt -x data.txt -o ct.json \
//!        derive-function-key -y func.txt -o sky.json \
//!        decrypt -c ct.json
//! ```

mod io;

use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::time::Instant;

use num_bigint::BigInt;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use ringfe_core::{
    serialize, ChainModulus, Ciphertext, FunctionKey, IpfeParams, PublicKey, RlweIpfe, SecretKey,
};

type CliResult = Result<(), Box<dyn Error>>;

const COMMANDS: &[&str] = &[
    "gen-params",
    "gen-secret-key",
    "gen-public-key",
    "derive-function-key",
    "encrypt",
    "decrypt",
    "decrypt-all",
    "random-vector",
    "random-matrix",
    "test-dot",
];

/// Objects shared between chained commands.
#[derive(Default)]
struct Session {
    scheme: Option<RlweIpfe<ChainModulus>>,
    msk: Option<SecretKey<ChainModulus>>,
    mpk: Option<PublicKey<ChainModulus>>,
    sky: Option<FunctionKey<ChainModulus>>,
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let starts: Vec<usize> = args
        .iter()
        .enumerate()
        .filter(|(_, a)| COMMANDS.contains(&a.as_str()))
        .map(|(i, _)| i)
        .collect();
    if starts.is_empty() {
        println!("valid commands: {}", COMMANDS.join(", "));
        return;
    }
    if starts[0] != 0 {
        eprintln!("unknown command {:?}", args[0]);
        std::process::exit(1);
    }
    let mut bounds = starts;
    bounds.push(args.len());

    let mut session = Session::default();
    let mut rng = ChaCha20Rng::from_entropy();
    for w in bounds.windows(2) {
        let cmd = args[w[0]].clone();
        let cmd_args = &args[w[0] + 1..w[1]];
        if let Err(e) = run_command(&cmd, cmd_args, &mut session, &mut rng) {
            eprintln!("{cmd}: {e}");
            std::process::exit(1);
        }
    }
}

fn run_command(
    cmd: &str,
    args: &[String],
    session: &mut Session,
    rng: &mut ChaCha20Rng,
) -> CliResult {
    match cmd {
        "gen-params" => gen_params(args, session),
        "gen-secret-key" => gen_secret_key(args, session, rng),
        "gen-public-key" => gen_public_key(args, session, rng),
        "derive-function-key" => derive_function_key(args, session),
        "encrypt" => encrypt(args, session, rng),
        "decrypt" => decrypt(args, session),
        "decrypt-all" => decrypt_all(args, session),
        "random-vector" => random_vector(args, rng),
        "random-matrix" => random_matrix(args, rng),
        "test-dot" => test_dot(args),
        _ => unreachable!("dispatcher only forwards known commands"),
    }
}

/// Flags are `-name value` pairs; names listed in `switches` take no value.
fn parse_flags(args: &[String], switches: &[&str]) -> Result<HashMap<String, String>, Box<dyn Error>> {
    let mut flags = HashMap::new();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let name = arg
            .strip_prefix('-')
            .ok_or_else(|| format!("unexpected argument {arg:?}"))?;
        if switches.contains(&name) {
            flags.insert(name.to_string(), String::new());
            i += 1;
        } else {
            let value = args
                .get(i + 1)
                .ok_or_else(|| format!("missing value for -{name}"))?;
            flags.insert(name.to_string(), value.clone());
            i += 2;
        }
    }
    Ok(flags)
}

fn require<'a>(flags: &'a HashMap<String, String>, name: &str) -> Result<&'a String, Box<dyn Error>> {
    flags
        .get(name)
        .ok_or_else(|| format!("required flag -{name} missing").into())
}

fn parse_num<T: std::str::FromStr>(s: &str, name: &str) -> Result<T, Box<dyn Error>>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| format!("invalid -{name} value {s:?}: {e}").into())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1e3
}

fn load_params(flags: &HashMap<String, String>, session: &mut Session) -> CliResult {
    if let Some(p) = flags.get("p") {
        println!("Reading parameters from {p}");
        let params: IpfeParams<ChainModulus> = serialize::load_json(Path::new(p))?;
        session.scheme = Some(RlweIpfe::new(params)?);
    }
    Ok(())
}

fn gen_params(args: &[String], session: &mut Session) -> CliResult {
    let flags = parse_flags(args, &[])?;
    let l: usize = parse_num(require(&flags, "l")?, "l")?;
    let bx: i64 = parse_num(require(&flags, "x")?, "x")?;
    let by: i64 = parse_num(require(&flags, "y")?, "y")?;
    let n: usize = flags.get("n").map(|s| parse_num(s, "n")).transpose()?.unwrap_or(1);
    let sec: u32 = flags.get("k").map(|s| parse_num(s, "k")).transpose()?.unwrap_or(128);

    println!("Generating parameters");
    let start = Instant::now();
    let scheme = RlweIpfe::<ChainModulus>::generate(sec, l, n, bx, by)?;
    println!("Parameter generation done in {:.3} ms", elapsed_ms(start));
    println!("{}", scheme.params);
    if let Some(o) = flags.get("o") {
        println!("Writing parameters to {o}");
        serialize::save_json(Path::new(o), &scheme.params)?;
    }
    session.scheme = Some(scheme);
    Ok(())
}

fn gen_secret_key(args: &[String], session: &mut Session, rng: &mut ChaCha20Rng) -> CliResult {
    let flags = parse_flags(args, &[])?;
    load_params(&flags, session)?;
    let scheme = session.scheme.as_ref().ok_or("parameters missing")?;

    println!("Generating secret key");
    let start = Instant::now();
    let msk = scheme.generate_secret_key(rng);
    println!("Secret key generation done in {:.3} ms", elapsed_ms(start));
    if let Some(o) = flags.get("o") {
        println!("Writing secret key to {o}");
        serialize::save_json(Path::new(o), &msk)?;
    }
    session.msk = Some(msk);
    Ok(())
}

fn gen_public_key(args: &[String], session: &mut Session, rng: &mut ChaCha20Rng) -> CliResult {
    let flags = parse_flags(args, &[])?;
    load_params(&flags, session)?;
    if let Some(k) = flags.get("k") {
        println!("Reading secret key from {k}");
        session.msk = Some(serialize::load_json(Path::new(k))?);
    }
    let scheme = session.scheme.as_ref().ok_or("parameters missing")?;
    let msk = session.msk.as_ref().ok_or("secret key missing")?;

    println!("Generating public key");
    let start = Instant::now();
    let mpk = scheme.generate_public_key(msk, rng)?;
    println!("Public key generation done in {:.3} ms", elapsed_ms(start));
    if let Some(o) = flags.get("o") {
        println!("Writing public key to {o}");
        serialize::save_json(Path::new(o), &mpk)?;
    }
    session.mpk = Some(mpk);
    Ok(())
}

fn derive_function_key(args: &[String], session: &mut Session) -> CliResult {
    let flags = parse_flags(args, &[])?;
    load_params(&flags, session)?;
    let y_path = require(&flags, "y")?;
    println!("Reading function vector from {y_path}");
    let y = io::read_vector(Path::new(y_path))?;
    if let Some(k) = flags.get("k") {
        println!("Reading secret key from {k}");
        session.msk = Some(serialize::load_json(Path::new(k))?);
    }
    let scheme = session.scheme.as_ref().ok_or("parameters missing")?;
    let msk = session.msk.as_ref().ok_or("secret key missing")?;

    println!("Deriving function key");
    let start = Instant::now();
    let sky = scheme.derive_function_key(&y, msk)?;
    println!("Function key derivation done in {:.3} ms", elapsed_ms(start));
    if let Some(o) = flags.get("o") {
        println!("Writing function key to {o}");
        serialize::save_json(Path::new(o), &sky)?;
    }
    session.sky = Some(sky);
    Ok(())
}

fn encrypt(args: &[String], session: &mut Session, rng: &mut ChaCha20Rng) -> CliResult {
    let flags = parse_flags(args, &["s"])?;
    load_params(&flags, session)?;
    let x_path = require(&flags, "x")?;
    println!("Reading secret matrix from {x_path}");
    let x = io::read_matrix(Path::new(x_path))?;
    if let Some(k) = flags.get("k") {
        println!("Reading public key from {k}");
        session.mpk = Some(serialize::load_json(Path::new(k))?);
    }
    let o = require(&flags, "o")?;
    let scheme = session.scheme.as_ref().ok_or("parameters missing")?;
    let mpk = session.mpk.as_ref().ok_or("public key missing")?;

    println!("Encrypting");
    let start = Instant::now();
    let ct = if flags.contains_key("s") {
        let row = x.first().ok_or("empty matrix file")?;
        scheme.encrypt_single(row, mpk, rng)?
    } else {
        scheme.encrypt_multi(&x, mpk, rng)?
    };
    println!("Encryption done in {:.3} ms", elapsed_ms(start));
    println!("Writing ciphertext to {o}");
    serialize::save_json(Path::new(o), &ct)?;
    Ok(())
}

fn decrypt(args: &[String], session: &mut Session) -> CliResult {
    let flags = parse_flags(args, &[])?;
    load_params(&flags, session)?;
    let c = require(&flags, "c")?;
    println!("Reading ciphertext from {c}");
    let ct: Ciphertext<ChainModulus> = serialize::load_json(Path::new(c))?;
    if let Some(k) = flags.get("k") {
        println!("Reading function key from {k}");
        session.sky = Some(serialize::load_json(Path::new(k))?);
    }
    let scheme = session.scheme.as_ref().ok_or("parameters missing")?;
    let sky = session.sky.as_ref().ok_or("function key missing")?;

    println!("Decrypting");
    let start = Instant::now();
    let xy = scheme.decrypt(&ct, sky)?;
    println!("Decryption done in {:.3} ms", elapsed_ms(start));
    println!("Result:");
    println!(
        "[{}]",
        xy.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
    );
    if let Some(o) = flags.get("o") {
        println!("Writing result to {o}");
        io::write_vector(Path::new(o), &xy)?;
    }
    Ok(())
}

fn decrypt_all(args: &[String], session: &mut Session) -> CliResult {
    let flags = parse_flags(args, &[])?;
    load_params(&flags, session)?;
    let c = require(&flags, "c")?;
    println!("Reading ciphertext from {c}");
    let ct: Ciphertext<ChainModulus> = serialize::load_json(Path::new(c))?;
    if let Some(k) = flags.get("k") {
        println!("Reading secret key from {k}");
        session.msk = Some(serialize::load_json(Path::new(k))?);
    }
    let o = require(&flags, "o")?;
    let scheme = session.scheme.as_ref().ok_or("parameters missing")?;
    let msk = session.msk.as_ref().ok_or("secret key missing")?;

    println!("Decrypting");
    let start = Instant::now();
    let x = scheme.decrypt_all(&ct, msk)?;
    println!("Decryption done in {:.3} ms", elapsed_ms(start));
    println!("Writing result to {o}");
    io::write_matrix(Path::new(o), &x)?;
    Ok(())
}

fn random_vector(args: &[String], rng: &mut ChaCha20Rng) -> CliResult {
    let flags = parse_flags(args, &[])?;
    let l: usize = parse_num(require(&flags, "l")?, "l")?;
    let b: i64 = parse_num::<i64>(require(&flags, "b")?, "b")?.abs();
    let o = require(&flags, "o")?;

    println!("Generating random vector");
    let v: Vec<i64> = (0..l).map(|_| rng.gen_range(-b..=b)).collect();
    println!("Writing random vector to {o}");
    io::write_vector(Path::new(o), &v)?;
    Ok(())
}

fn random_matrix(args: &[String], rng: &mut ChaCha20Rng) -> CliResult {
    let flags = parse_flags(args, &[])?;
    let cols: usize = parse_num(require(&flags, "c")?, "c")?;
    let rows: usize = parse_num(require(&flags, "r")?, "r")?;
    let b: i64 = parse_num::<i64>(require(&flags, "b")?, "b")?.abs();
    let o = require(&flags, "o")?;

    println!("Generating random matrix");
    let m: Vec<Vec<i64>> = (0..rows)
        .map(|_| (0..cols).map(|_| rng.gen_range(-b..=b)).collect())
        .collect();
    println!("Writing random matrix to {o}");
    io::write_matrix(Path::new(o), &m)?;
    Ok(())
}

/// Plaintext inner products of a matrix file against a vector file, for
/// checking functional decryption output.
fn test_dot(args: &[String]) -> CliResult {
    let flags = parse_flags(args, &[])?;
    let x_path = require(&flags, "x")?;
    let y_path = require(&flags, "y")?;
    println!("Reading matrix from {x_path}");
    let x = io::read_matrix(Path::new(x_path))?;
    println!("Reading vector from {y_path}");
    let y = io::read_vector(Path::new(y_path))?;

    let mut dots = Vec::with_capacity(x.len());
    for row in &x {
        if row.len() != y.len() {
            return Err(format!(
                "row length {} does not match vector length {}",
                row.len(),
                y.len()
            )
            .into());
        }
        let dot: BigInt = row
            .iter()
            .zip(y.iter())
            .map(|(&a, &b)| BigInt::from(a) * BigInt::from(b))
            .sum();
        dots.push(dot);
    }
    println!("Result:");
    println!(
        "[{}]",
        dots.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
    );
    Ok(())
}
