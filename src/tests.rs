#[cfg(test)]
pub mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;

    use crate::evaluation::{
        direct_convolution, generate_noise, generate_sinusoid, impulse, max_abs_difference, onset,
        sideband_energy,
    };
    use crate::{
        Convolution, ConvolutionEngine, Convolver, EngineConfig, PartitionedResponse, RealFft,
        Sample,
    };

    fn config(frame_length: usize) -> EngineConfig {
        EngineConfig {
            frame_length,
            ..EngineConfig::default()
        }
    }

    fn engine(response: &[Sample], config: &EngineConfig, channel: usize) -> ConvolutionEngine {
        let mut fft = RealFft::new(config.frame_length);
        let partitions = PartitionedResponse::new(&[response], &mut fft, config).unwrap();
        ConvolutionEngine::new(fft, Arc::new(partitions), channel).unwrap()
    }

    /// Feeds `input` through `engine`, cycling through `block_sizes`.
    fn process_in_blocks(
        engine: &mut ConvolutionEngine,
        input: &[Sample],
        block_sizes: &[usize],
    ) -> Vec<Sample> {
        let mut output = vec![0.0; input.len()];
        let mut start = 0;
        for &block_size in block_sizes.iter().cycle() {
            if start == input.len() {
                break;
            }
            let end = (start + block_size).min(input.len());
            engine
                .process(&input[start..end], &mut output[start..end])
                .unwrap();
            start = end;
        }
        output
    }

    /// Direct convolution shifted by the engine latency.
    fn expected_output(input: &[Sample], response: &[Sample], latency: usize) -> Vec<Sample> {
        let mut expected = vec![0.0; latency.min(input.len())];
        expected.extend(direct_convolution(
            &input[..input.len() - expected.len()],
            response,
        ));
        expected
    }

    #[test]
    fn impulse_response_is_recovered_after_half_frame() {
        // 512 sample frames, 4 divisions, host blocks of 64
        let config = config(512);
        let response = generate_noise(1024, 1, 0.8);
        let mut engine = engine(&response, &config, 0);
        assert_eq!(engine.response().num_ir_divisions(), 4);

        let input = impulse(24 * 64, 0);
        let output = process_in_blocks(&mut engine, &input, &[64]);

        assert!(output[..256].iter().all(|&s| s == 0.0));
        for (k, &expected) in response.iter().enumerate() {
            assert_abs_diff_eq!(output[256 + k], expected, epsilon = 1e-5);
        }
        assert!(output[256 + 1024..].iter().all(|s| s.abs() < 1e-5));
    }

    #[test]
    fn output_is_linear_in_input() {
        let config = config(256);
        let response = generate_noise(700, 2, 0.2);
        let x = generate_noise(4096, 3, 1.0);
        let y = generate_sinusoid(4096, 440.0, 48000.0, 0.6);
        let (a, b): (Sample, Sample) = (0.7, -1.3);
        let mixed: Vec<Sample> = x.iter().zip(&y).map(|(x, y)| a * x + b * y).collect();

        let out_x = process_in_blocks(&mut engine(&response, &config, 0), &x, &[32]);
        let out_y = process_in_blocks(&mut engine(&response, &config, 0), &y, &[32]);
        let out_mixed = process_in_blocks(&mut engine(&response, &config, 0), &mixed, &[32]);

        let superposed: Vec<Sample> = out_x
            .iter()
            .zip(&out_y)
            .map(|(x, y)| a * x + b * y)
            .collect();
        assert!(max_abs_difference(&out_mixed, &superposed) < 1e-4);
    }

    #[test]
    fn latency_is_half_frame_for_any_block_size() {
        let config = config(512);
        let mut response = generate_noise(900, 4, 0.1);
        response[0] = 1.0;

        for block_size in [16, 32, 64, 128, 256, 100, 512, 1] {
            let mut engine = engine(&response, &config, 0);
            assert_eq!(engine.latency(), 256);
            let input = impulse(2048, 0);
            let output = process_in_blocks(&mut engine, &input, &[block_size]);
            assert_eq!(onset(&output, 1e-3), Some(256), "block size {block_size}");
        }
    }

    #[test]
    fn latency_is_half_frame_for_staggered_channels() {
        let config = EngineConfig {
            frame_length: 128,
            channels: 4,
            stagger_channels: true,
            ..EngineConfig::default()
        };
        let response = impulse(200, 0);

        for channel in 0..4 {
            let mut engine = engine(&response, &config, channel);
            let input = impulse(512, 3);
            let output = process_in_blocks(&mut engine, &input, &[16]);
            assert_eq!(onset(&output, 1e-3), Some(64 + 3), "channel {channel}");
        }
    }

    #[test]
    fn every_division_is_multiplied_before_the_boundary() {
        // half frame 64, block 16: four sub-steps, ratio 3
        let config = config(128);
        let response = generate_noise(6 * 64, 5, 0.3);
        let mut engine = engine(&response, &config, 0);
        let input = generate_noise(16, 6, 1.0);
        let mut output = vec![0.0; 16];

        let mut checked = 0;
        for _ in 0..64 {
            engine.process(&input, &mut output).unwrap();
            let schedule = engine.schedule();
            assert!(schedule.ir.written < schedule.ir.read);
            if engine.state().count_down == 16 {
                assert_eq!(schedule.ir.written, schedule.ir.read - 1);
                checked += 1;
            }
        }
        assert_eq!(checked, 16);
    }

    #[test]
    fn valid_divisions_ramp_up_one_per_boundary() {
        let config = config(64);
        let response = generate_noise(5 * 32, 7, 0.3);
        let mut engine = engine(&response, &config, 0);
        assert_eq!(engine.schedule().ir.read, 1);

        let input = [0.5; 32];
        let mut output = [0.0; 32];
        let mut reads = Vec::new();
        for _ in 0..7 {
            engine.process(&input, &mut output).unwrap();
            reads.push(engine.schedule().ir.read);
        }
        assert_eq!(reads, vec![2, 3, 4, 5, 5, 5, 5]);
    }

    #[test]
    fn silence_after_input_stops_is_exact() {
        let config = config(128);
        let response = generate_noise(500, 8, 0.5);
        let mut engine = engine(&response, &config, 0);
        let num_divisions = engine.response().num_ir_divisions();

        let mut input = generate_noise(2000, 9, 1.0);
        input.extend(vec![0.0; 64 * (num_divisions + 4)]);
        process_in_blocks(&mut engine, &input, &[48]);

        let zeros = vec![0.0; 64 * 8];
        let output = process_in_blocks(&mut engine, &zeros, &[48]);
        assert!(output.iter().all(|&s| s == 0.0));
        assert!(engine.overlap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn matches_direct_convolution_for_irregular_blocks() {
        let response = generate_noise(1000, 10, 0.1);
        let input = generate_noise(6000, 11, 0.5);

        for frame_length in [64, 128, 1024] {
            let config = config(frame_length);
            let mut engine = engine(&response, &config, 0);
            let output =
                process_in_blocks(&mut engine, &input, &[1, 17, 64, 63, 200, 5, 128, 300, 2]);
            let expected = expected_output(&input, &response, config.half_length());
            assert!(
                max_abs_difference(&output, &expected) < 1e-3,
                "frame length {frame_length}"
            );
        }
    }

    #[test]
    fn multichannel_convolver_matches_direct_convolution() {
        let config = EngineConfig {
            frame_length: 128,
            channels: 3,
            process_headroom: 2,
            stagger_channels: true,
        };
        let left = generate_noise(640, 12, 0.1);
        let right = generate_noise(333, 13, 0.1);
        let mut convolver = Convolver::new(config, &[&left, &right]).unwrap();
        assert_eq!(convolver.engine(0).response().num_process_divisions(0), 12);

        let inputs: Vec<Vec<Sample>> = (0..3)
            .map(|channel| generate_noise(3000, 20 + channel, 0.5))
            .collect();
        let mut outputs = vec![vec![0.0; 3000]; 3];

        let block_sizes = [40, 7, 64, 90];
        let mut start = 0;
        for &block_size in block_sizes.iter().cycle() {
            if start == 3000 {
                break;
            }
            let end = (start + block_size).min(3000);
            for channel in 0..3 {
                convolver
                    .process_channel(
                        channel,
                        &inputs[channel][start..end],
                        &mut outputs[channel][start..end],
                    )
                    .unwrap();
            }
            start = end;
        }

        for channel in 0..3 {
            let response: &[Sample] = if channel % 2 == 0 { &left } else { &right };
            let expected = expected_output(&inputs[channel], response, convolver.latency());
            assert!(
                max_abs_difference(&outputs[channel], &expected) < 1e-3,
                "channel {channel}"
            );
        }
    }

    #[test]
    fn set_response_restarts_with_new_response() {
        let config = config(128);
        let short = generate_noise(100, 14, 0.3);
        let long = generate_noise(900, 15, 0.3);
        let mut convolver = Convolver::new(config, &[&short]).unwrap();

        let warmup = generate_noise(1000, 16, 0.5);
        let mut scratch = vec![0.0; 50];
        for block in warmup.chunks(50) {
            convolver.process_channel(0, block, &mut scratch).unwrap();
        }

        convolver.set_response(&[&long]).unwrap();
        assert_eq!(convolver.response().num_ir_divisions(), 15);

        let input = generate_noise(2000, 17, 0.5);
        let mut output = vec![0.0; 2000];
        for (i, block) in input.chunks(50).enumerate() {
            convolver
                .process_channel(0, block, &mut output[i * 50..i * 50 + block.len()])
                .unwrap();
        }
        let expected = expected_output(&input, &long, convolver.latency());
        assert!(max_abs_difference(&output, &expected) < 1e-3);
    }

    #[test]
    fn varying_block_sizes_leave_no_boundary_artifacts() {
        let sample_rate = 48000.0;
        let frequency = 100.0;
        let num_samples = 4080;
        let response = impulse(300, 0);
        let mut convolver = Convolver::new(config(256), &[&response]).unwrap();
        let latency = convolver.latency();

        let input = generate_sinusoid(num_samples + latency, frequency, sample_rate, 1.0);
        let mut output = vec![0.0; input.len()];
        let mut start = 0;
        for &block_size in [3, 128, 77, 500, 31].iter().cycle() {
            if start == input.len() {
                break;
            }
            let end = (start + block_size).min(input.len());
            convolver
                .process_channel(0, &input[start..end], &mut output[start..end])
                .unwrap();
            start = end;
        }

        assert!(sideband_energy(&output[latency..], frequency, sample_rate) < 0.01);
    }

    #[test]
    fn convolution_trait_sizes_frame_from_block() {
        fn run<C: Convolution>(
            response: &[Sample],
            block_size: usize,
            input: &[Sample],
        ) -> Vec<Sample> {
            let mut convolver = C::init(response, block_size);
            let mut output = vec![0.0; input.len()];
            for (input, output) in input.chunks(block_size).zip(output.chunks_mut(block_size)) {
                convolver.process(input, output);
            }
            output
        }

        let response = generate_noise(777, 18, 0.2);
        let input = generate_noise(3000, 19, 0.5);
        let block_size = 100;
        let output = run::<Convolver>(&response, block_size, &input);

        // 100 samples round up to 128 sample divisions
        let expected = expected_output(&input, &response, 128);
        assert!(max_abs_difference(&output, &expected) < 1e-3);
    }
}
