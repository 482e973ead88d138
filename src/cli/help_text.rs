pub(super) const ROOT_LONG_ABOUT: &str = "\
Watch a directory tree for added, removed and modified files

Treesentry records a cryptographic digest of every regular file under a directory
and periodically rescans the tree, reporting what changed since the previous scan.

CORE CONCEPTS:

  Baseline:
    The last recorded state of the tree: a TOML file mapping absolute file paths to
    content digests, plus the hash algorithm used. By default it is written to
    file_hashes.toml in the current working directory (see --baseline). Writes are
    atomic, so an interrupted save never leaves a corrupted baseline behind.

  Cycles:
    Monitoring repeats scan -> compare -> report -> save on a fixed interval. By
    default each cycle's result becomes the baseline for the next, so reported
    changes are always relative to the previous cycle. With --fixed-baseline the
    baseline present at startup is kept and every cycle is compared against it.

  .fimignore:
    A gitignore-style file at the root of the watched directory. Patterns are matched
    against paths relative to that root. Supported: literal names, *, **, trailing /
    for directories and leading ! to re-include. Ignored directories are never
    entered. Malformed lines are skipped with a warning. The file is read once when
    monitoring starts and is never itself hashed.

  Skipped entries:
    Symlinks, devices, sockets and FIFOs are never hashed. Files that cannot be read
    or that vanish mid-scan are left out of that cycle and logged as warnings.

TYPICAL WORKFLOW:

  1. Record a baseline:
     $ treesentry /etc/myapp --init

  2. Monitor, rescanning every 30 seconds (Ctrl+C to stop):
     $ treesentry /etc/myapp -i 30

  3. One-shot check against the recorded baseline, e.g. from cron:
     $ treesentry /etc/myapp --cycles 1 --fixed-baseline

OUTPUT:

  Changes are printed to stdout, one line per path:

    A  path   added since the baseline
    R  path   removed since the baseline
    M  path   content changed
    .  path   unchanged (only with --all)
    !  path   skipped this cycle, with the reason (only with --all)

  followed by a fingerprint identifying the exact change set. Use --diff to also
  show old and new digests. Log messages go to stderr.

EXIT STATUS:

  0    init completed, or monitoring stopped cleanly (Ctrl+C or --cycles)
  255  configuration error (missing directory, unknown algorithm) or repeated
       baseline save failures
";
